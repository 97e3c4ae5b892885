//! Integration tests for the `terse` binary: building documents from
//! arguments, mutating piped-in JSON, querying, output formats, and error
//! rendering.

use assert_cmd::Command;
use predicates::prelude::*;

fn terse() -> Command {
    Command::cargo_bin("terse").unwrap()
}

/// Helper: run args and parse stdout as JSON.
fn run_json(args: &[&str]) -> serde_json::Value {
    let output = terse().args(args).output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

// ============================================================================
// Building documents
// ============================================================================

#[test]
fn builds_nested_document_from_args() {
    let value = run_json(&["foo.bar: 1, baz: true"]);
    assert_eq!(value, serde_json::json!({"foo": {"bar": 1}, "baz": true}));
}

#[test]
fn multiple_args_are_joined_with_spaces() {
    let value = run_json(&["foo:", "hello", "world"]);
    assert_eq!(value, serde_json::json!({"foo": "hello world"}));
}

#[test]
fn stdin_document_is_mutated() {
    let output = terse()
        .arg("foo[]: 3")
        .write_stdin(r#"{"foo": [1, 2]}"#)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value, serde_json::json!({"foo": [1, 2, 3]}));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn query_selects_subtree() {
    terse()
        .args(["-q", "items[0]"])
        .write_stdin(r#"{"items": [7, 8, 9]}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("7"));
}

#[test]
fn query_without_match_prints_no_match() {
    terse()
        .args(["-q", "missing"])
        .write_stdin(r#"{"items": []}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("No match"));
}

// ============================================================================
// Output formats
// ============================================================================

#[test]
fn shorthand_format_roundtrips() {
    terse()
        .args(["-f", "shorthand", "foo{id: 1}"])
        .assert()
        .success()
        .stdout(predicate::str::contains("foo: {id: 1}"));
}

#[test]
fn cbor_format_emits_binary() {
    let output = terse()
        .args(["-f", "cbor", "a: 1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let decoded: ciborium::Value = ciborium::from_reader(output.stdout.as_slice()).unwrap();
    assert_eq!(
        decoded,
        ciborium::Value::Map(vec![(
            ciborium::Value::Text("a".into()),
            ciborium::Value::Integer(1.into()),
        )])
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn parse_errors_render_pretty_and_exit_nonzero() {
    terse()
        .arg("{a[1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected ']'"))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn query_errors_render_pretty_and_exit_nonzero() {
    terse()
        .args(["-q", "foo["])
        .write_stdin(r#"{"foo": [1]}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected ']'"));
}

#[test]
fn no_arguments_is_an_error() {
    terse()
        .assert()
        .failure()
        .stderr(predicate::str::contains("At least one"));
}
