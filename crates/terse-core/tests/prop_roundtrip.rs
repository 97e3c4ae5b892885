//! Property-based invariants.
//!
//! Strategies generate random value trees and check that:
//! - marshalled shorthand re-parses and re-applies to the same tree
//! - coercion is idempotent over its own token rendering
//! - `get_path("", v)` is the identity
//! - slicing with a stop past the end matches the unsliced field
//!
//! Known expressiveness limits excluded from generation:
//! - negative numbers (numeric tokens must lead with a digit, so they
//!   re-parse as strings)
//! - NaN/infinity (never produced by the parser)
//! - empty and backslash-containing map keys

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use terse_core::{
    coerce::coerce, get_path, marshal, parse_and_apply, GetOptions, ParseOptions, Value,
};

// ============================================================================
// Strategies
// ============================================================================

/// Map keys: bare-safe and quoted-requiring shapes, no backslashes.
fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_]{0,12}").unwrap(),
        // Keys that force quoting in marshalled output.
        Just("true".to_string()),
        Just("4".to_string()),
        Just("with space".to_string()),
        Just("dot.ted".to_string()),
        Just("colon:key".to_string()),
    ]
}

fn arb_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,20}",
        // Strings that would coerce if left bare.
        Just("true".to_string()),
        Just("null".to_string()),
        Just("42".to_string()),
        Just("3.14".to_string()),
        Just("2020-01-01T12:00:00Z".to_string()),
        Just("undefined".to_string()),
        // Strings that collide with structure.
        Just("a, b".to_string()),
        Just("curly {brace}".to_string()),
        Just("@file".to_string()),
        Just("%ff".to_string()),
        Just("line\nbreak".to_string()),
        Just("caf\u{00e9}".to_string()),
    ]
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (0i64..1_000_000_000).prop_map(Value::Int),
        (0.0f64..1e9).prop_map(Value::Float),
        arb_string().prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        (0i64..4_000_000_000).prop_map(|secs| {
            Value::Timestamp(Utc.timestamp_opt(secs, 0).unwrap())
        }),
    ]
}

/// Trees up to three levels deep with maps and sequences.
fn arb_value() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Seq),
            prop::collection::hash_map(arb_key(), inner, 0..5).prop_map(Value::MapStr),
        ]
    })
}

/// Documents: a string-keyed map at the root, like real CLI usage.
fn arb_document() -> impl Strategy<Value = Value> {
    prop::collection::hash_map(arb_key(), arb_value(), 0..6).prop_map(Value::MapStr)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn marshal_roundtrips_documents(doc in arb_document()) {
        let text = marshal(&doc);
        let rebuilt = parse_and_apply(&text, None, ParseOptions::default())
            .unwrap_or_else(|e| panic!("reparse failed for {text:?}:\n{}", e.pretty()));
        prop_assert_eq!(rebuilt, doc, "shorthand: {}", text);
    }

    #[test]
    fn marshal_roundtrips_scalars(value in arb_scalar()) {
        let text = marshal(&value);
        // Detection stays off: a bare scalar is not an object body.
        let rebuilt = parse_and_apply(&text, None, ParseOptions::default())
            .unwrap_or_else(|e| panic!("reparse failed for {text:?}:\n{}", e.pretty()));
        prop_assert_eq!(rebuilt, value, "shorthand: {}", text);
    }

    #[test]
    fn coercion_is_idempotent(value in arb_scalar()) {
        let token = marshal(&value);
        if let Some(first) = coerce(&token) {
            let token_again = marshal(&first);
            let second = coerce(&token_again);
            prop_assert_eq!(second, Some(first));
        }
    }

    #[test]
    fn empty_query_is_identity(doc in arb_document()) {
        let (result, found) = get_path("", &doc, GetOptions::default()).unwrap();
        prop_assert!(!found);
        prop_assert_eq!(result, doc);
    }

    #[test]
    fn set_then_get_returns_the_value(
        key in prop::string::string_regex("[a-z][a-z0-9]{0,8}").unwrap(),
        nested in prop::string::string_regex("[a-z][a-z0-9]{0,8}").unwrap(),
    ) {
        let input = format!("{{{key}.{nested}: sentinel}}");
        let doc = parse_and_apply(&input, None, ParseOptions::default()).unwrap();
        let (value, found) =
            get_path(&format!("{key}.{nested}"), &doc, GetOptions::default()).unwrap();
        prop_assert!(found);
        prop_assert_eq!(value, Value::String("sentinel".into()));
    }

    #[test]
    fn oversized_slice_matches_whole_field(items in prop::collection::vec(0i64..100, 0..8)) {
        let seq = Value::Seq(items.into_iter().map(Value::Int).collect());
        let doc = Value::MapStr(HashMap::from([("a".to_string(), seq.clone())]));
        let (sliced, _) = get_path("a[:99]", &doc, GetOptions::default()).unwrap();
        prop_assert_eq!(sliced, seq);
    }
}
