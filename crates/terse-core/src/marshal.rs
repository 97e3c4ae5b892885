//! Render a value tree back to parseable shorthand.
//!
//! The output is the canonical textual form: maps render as `{k: v, ...}`
//! with sorted keys, sequences as `[v, ...]`, bytes as `%base64`,
//! timestamps as RFC3339 tokens, and strings are quoted exactly when the
//! bare token would coerce or collide with structure. Non-string map keys
//! render as bare tokens with structural runes escaped so re-parsing
//! coerces them back to the same key.
//!
//! Negative numbers are the one lossy corner: the notation only coerces
//! tokens that lead with a digit, so `-5` re-parses as a string.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::SecondsFormat;

use crate::coerce::can_coerce;
use crate::value::{MapKey, Value};

/// Render `value` as shorthand text that re-parses to the same tree.
pub fn marshal(value: &Value) -> String {
    let mut out = String::new();
    render(value, &mut out);
    out
}

fn render(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&float_token(*f)),
        Value::Timestamp(ts) => {
            out.push_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        }
        Value::Bytes(b) => {
            out.push('%');
            out.push_str(&BASE64.encode(b));
        }
        Value::String(s) => render_string(s, out),
        Value::Seq(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(item, out);
            }
            out.push(']');
        }
        Value::MapStr(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_string_key(k, out);
                out.push_str(": ");
                render(&m[*k], out);
            }
            out.push('}');
        }
        Value::MapAny(m) => {
            let mut entries: Vec<(String, &Value)> =
                m.iter().map(|(k, v)| (render_key(k), v)).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(k);
                out.push_str(": ");
                render(v, out);
            }
            out.push('}');
        }
    }
}

/// Floats always carry a `.` or exponent so they re-coerce as floats.
fn float_token(f: f64) -> String {
    let text = f.to_string();
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

/// Runes with structural meaning somewhere in the grammar; a bare string
/// token containing any of these must be quoted.
fn is_structural(c: char) -> bool {
    matches!(
        c,
        '.' | '{' | '}' | '[' | ']' | ':' | '^' | ',' | '"' | '\\'
    ) || c.is_control()
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s == "undefined"
        || can_coerce(s)
        || s.starts_with('@')
        || s.starts_with('%')
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
        || s.chars().any(is_structural)
}

fn render_string(s: &str, out: &mut String) {
    if !needs_quoting(s) {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A string map key: bare when safe, quoted otherwise. Quoting also pins
/// coercible bodies ("true", "4") as string keys.
fn render_string_key(key: &str, out: &mut String) {
    render_string(key, out);
}

/// A non-string map key renders as its scalar token with structural runes
/// backslash-escaped; re-parsing unescapes and coerces it back.
fn render_key(key: &MapKey) -> String {
    match key {
        MapKey::String(s) => {
            let mut out = String::new();
            render_string_key(s, &mut out);
            out
        }
        other => {
            let token = match other {
                MapKey::Null => "null".to_string(),
                MapKey::Bool(b) => b.to_string(),
                MapKey::Int(i) => i.to_string(),
                MapKey::Float(f) => float_token(*f),
                MapKey::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                MapKey::String(_) => unreachable!(),
            };
            let mut out = String::with_capacity(token.len());
            for c in token.chars() {
                if matches!(c, '.' | '{' | '[' | ':' | '^' | ']' | ',') {
                    out.push('\\');
                }
                out.push(c);
            }
            out
        }
    }
}
