//! End-to-end parse + apply behavior: each test feeds a shorthand
//! expression (and optionally an existing document) through the parser and
//! applier and compares the JSON view of the result.

use terse_core::{parse_and_apply, ParseOptions, Value};

/// Parse `input`, apply it over `existing` (JSON text), and compare the
/// result's JSON view against `expected` (JSON text).
fn assert_applied(existing: Option<&str>, input: &str, expected: &str) {
    let existing = existing.map(|json| {
        let parsed: serde_json::Value = serde_json::from_str(json).expect("existing fixture");
        Value::from(parsed)
    });
    let result = parse_and_apply(input, existing, ParseOptions::default())
        .unwrap_or_else(|e| panic!("parse/apply failed:\n{}", e.pretty()));
    let got = serde_json::to_value(&result).expect("JSON view");
    let want: serde_json::Value = serde_json::from_str(expected).expect("expected fixture");
    assert_eq!(got, want, "input: {input}");
}

// ============================================================================
// Scalars and coercion
// ============================================================================

#[test]
fn bare_value() {
    assert_applied(None, "true", "true");
}

#[test]
fn coercion_of_each_scalar_kind() {
    assert_applied(
        None,
        "{n: null, b: true, i: 1, f: 1.0, dt: 2020-01-01T12:00:00Z, s: hello}",
        r#"{"n": null, "b": true, "i": 1, "f": 1.0, "dt": "2020-01-01T12:00:00Z", "s": "hello"}"#,
    );
}

#[test]
fn quoted_values_stay_strings() {
    assert_applied(
        None,
        r#"{n: "null", b: "true", i: "1", f: "1.0", s: "hello"}"#,
        r#"{"n": "null", "b": "true", "i": "1", "f": "1.0", "s": "hello"}"#,
    );
}

#[test]
fn base64_value_renders_as_base64_json() {
    assert_applied(None, "{b: %wg==}", r#"{"b": "wg=="}"#);
}

// ============================================================================
// Nested property creation
// ============================================================================

#[test]
fn nested_properties_materialize_maps() {
    assert_applied(
        None,
        "{foo.bar.baz: hello}",
        r#"{"foo": {"bar": {"baz": "hello"}}}"#,
    );
}

#[test]
fn later_set_overwrites_with_new_type() {
    assert_applied(None, "{foo: [1, 2], foo: true}", r#"{"foo": true}"#);
}

#[test]
fn whitespace_is_insignificant_outside_quotes() {
    assert_applied(
        None,
        "{foo :    hello   ,    bar:world  }",
        r#"{"foo": "hello", "bar": "world"}"#,
    );
}

#[test]
fn quoted_whitespace_is_preserved() {
    assert_applied(
        None,
        r#"{"foo ": "   hello   ", "   bar":"world  "}"#,
        r#"{"foo ": "   hello   ", "   bar": "world  "}"#,
    );
}

#[test]
fn trailing_space_inside_sub_object_still_coerces() {
    assert_applied(None, "{foo{a: 1 }}", r#"{"foo": {"a": 1}}"#);
}

#[test]
fn multiline_entries_use_newline_separators() {
    assert_applied(
        None,
        "{\n\ta: 1\n\tb{\n\t\tc: 2\n\t}\n}",
        r#"{"a": 1, "b": {"c": 2}}"#,
    );
}

// ============================================================================
// Escapes and quoted keys
// ============================================================================

#[test]
fn escaped_dot_in_property() {
    assert_applied(None, "{foo\\.bar: baz}", r#"{"foo.bar": "baz"}"#);
}

#[test]
fn escaped_quote_in_quoted_property() {
    assert_applied(None, r#"{"foo\"bar": baz}"#, r#"{"foo\"bar": "baz"}"#);
}

#[test]
fn quoted_property_with_structural_chars() {
    assert_applied(None, r#"{"foo.bar": baz}"#, r#"{"foo.bar": "baz"}"#);
}

#[test]
fn naked_unicode_and_json_escapes() {
    assert_applied(
        None,
        r#"{foo\u000Abar: a\nb, baz\ta: a\nb}"#,
        r#"{"foo\nbar": "a\nb", "baz\ta": "a\nb"}"#,
    );
}

#[test]
fn escapes_inside_quoted_strings() {
    assert_applied(
        None,
        r#"{"foo\u000Abar": "a\nb", "baz\ta": "a\nb"}"#,
        r#"{"foo\nbar": "a\nb", "baz\ta": "a\nb"}"#,
    );
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn array_literal() {
    assert_applied(None, "{foo: [1, 2, 3]}", r#"{"foo": [1, 2, 3]}"#);
}

#[test]
fn top_level_array() {
    assert_applied(None, r#"[1, 2, "hello"]"#, r#"[1, 2, "hello"]"#);
}

#[test]
fn sparse_indexing_pads_with_null() {
    assert_applied(
        None,
        "{foo[3]: three, foo[5]: five, foo[0]: true}",
        r#"{"foo": [true, null, null, "three", null, "five"]}"#,
    );
}

#[test]
fn append_entries() {
    assert_applied(None, "{foo[]: 1, foo[]: 2, foo[]: 3}", r#"{"foo": [1, 2, 3]}"#);
}

#[test]
fn append_to_existing() {
    assert_applied(
        Some(r#"{"foo": [1, 2]}"#),
        "{foo[]: 3, foo[]: 4}",
        r#"{"foo": [1, 2, 3, 4]}"#,
    );
}

#[test]
fn insert_prepend() {
    assert_applied(None, "{foo: [1, 2], foo[^0]: 0}", r#"{"foo": [0, 1, 2]}"#);
}

#[test]
fn insert_middle() {
    assert_applied(None, "{foo: [1, 2], foo[^1]: 0}", r#"{"foo": [1, 0, 2]}"#);
}

#[test]
fn insert_past_end_pads_with_null() {
    assert_applied(None, "{foo: [1, 2], foo[^3]: 0}", r#"{"foo": [1, 2, null, 0]}"#);
}

#[test]
fn nested_append_and_index() {
    assert_applied(None, "{foo[][1][]: 1}", r#"{"foo": [[null, [1]]]}"#);
}

#[test]
fn complex_nested_arrays() {
    assert_applied(
        None,
        "{foo[][]: 1, foo[0][0][]: [2, 3], bar[]: true, bar[0]: false}",
        r#"{"foo": [[[[2, 3]]]], "bar": [false]}"#,
    );
}

#[test]
fn list_of_objects_share_appended_slot() {
    assert_applied(
        None,
        "{foo[]{id: 1, count: 1}, foo[]{id: 2, count: 2}}",
        r#"{"foo": [{"id": 1, "count": 1}, {"id": 2, "count": 2}]}"#,
    );
}

// ============================================================================
// JSON pass-through
// ============================================================================

#[test]
fn json_object_input_parses_as_shorthand() {
    let json = r#"{"null": null, "bool": true, "num": 1.5, "str": "hello", "arr": ["tag1", "tag2"], "obj": {"id": [1]}}"#;
    assert_applied(None, json, json);
}

// ============================================================================
// Non-string keys and promotion
// ============================================================================

#[test]
fn non_string_keys_promote_to_any_maps() {
    assert_applied(
        None,
        "{1: a, 2.3: b, bar.baz.4: c}",
        r#"{"1": "a", "2": {"3": "b"}, "bar": {"baz": {"4": "c"}}}"#,
    );
}

#[test]
fn mixed_key_map_promotes_existing_string_keys() {
    assert_applied(None, "{foo: true, 2: false}", r#"{"foo": true, "2": false}"#);
}

#[test]
fn nested_mixed_key_promotion() {
    assert_applied(
        None,
        "{foo.bar: true, foo.2: false, foo.2.baz: hello, foo.2.3: false}",
        r#"{"foo": {"bar": true, "2": {"baz": "hello", "3": false}}}"#,
    );
}

#[test]
fn quoted_coercible_keys_stay_strings() {
    assert_applied(
        None,
        r#"{"null": 0, "true": 1, "false": 2, "2020-01-01T12:00:00Z": 3, "4": 5}"#,
        r#"{"null": 0, "true": 1, "false": 2, "2020-01-01T12:00:00Z": 3, "4": 5}"#,
    );
}

#[test]
fn force_string_keys_disables_promotion() {
    let result = parse_and_apply(
        "{1: a, 2.3: b}",
        None,
        ParseOptions {
            force_string_keys: true,
            ..Default::default()
        },
    )
    .unwrap();
    // No MapAny anywhere: 2.3 nests as string segments.
    let got = serde_json::to_value(&result).unwrap();
    assert_eq!(
        got,
        serde_json::json!({"1": "a", "2": {"3": "b"}})
    );
    fn assert_no_map_any(value: &Value) {
        match value {
            Value::MapAny(_) => panic!("unexpected MapAny"),
            Value::MapStr(m) => m.values().for_each(assert_no_map_any),
            Value::Seq(items) => items.iter().for_each(assert_no_map_any),
            _ => {}
        }
    }
    assert_no_map_any(&result);
}

// ============================================================================
// Merging into an existing document
// ============================================================================

#[test]
fn existing_document_is_extended_in_place() {
    assert_applied(
        Some(
            r#"{
            "foo": [1, 2],
            "bar": [[1]],
            "baz": {"id": 1},
            "hello": "world"
        }"#,
        ),
        "{foo[]: 3, foo[]: 4, bar[0][]: 2, baz.another: test}",
        r#"{
            "foo": [1, 2, 3, 4],
            "bar": [[1, 2]],
            "baz": {"id": 1, "another": "test"},
            "hello": "world"
        }"#,
    );
}

// ============================================================================
// Deletion via undefined
// ============================================================================

#[test]
fn undefined_unsets_property() {
    assert_applied(
        Some(r#"{"foo": true, "bar": 1}"#),
        "{bar: undefined}",
        r#"{"foo": true}"#,
    );
}

#[test]
fn undefined_splices_array_item() {
    assert_applied(
        Some(r#"{"foo": [1, 2, 3, 4]}"#),
        "{foo[1]: undefined}",
        r#"{"foo": [1, 3, 4]}"#,
    );
}

// ============================================================================
// Swap
// ============================================================================

#[test]
fn swap_with_missing_destination_moves() {
    assert_applied(
        Some(r#"{"foo": "hello"}"#),
        "{bar ^ foo}",
        r#"{"bar": "hello"}"#,
    );
}

#[test]
fn swap_exchanges_two_properties() {
    assert_applied(
        Some(r#"{"foo": "hello", "bar": "world"}"#),
        "{bar ^ foo}",
        r#"{"bar": "hello", "foo": "world"}"#,
    );
}

#[test]
fn swap_with_index_splices_source() {
    assert_applied(
        Some(r#"{"foo": [1, 2, 3]}"#),
        "{bar ^ foo[0]}",
        r#"{"bar": 1, "foo": [2, 3]}"#,
    );
}

// ============================================================================
// Empty containers
// ============================================================================

#[test]
fn empty_object_and_array_literals() {
    assert_applied(None, "{}", "{}");
    assert_applied(None, "[]", "[]");
    assert_applied(None, "{a: {}, b: []}", r#"{"a": {}, "b": []}"#);
}
