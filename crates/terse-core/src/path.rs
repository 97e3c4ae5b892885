//! Canonical path tokenizer.
//!
//! The parser and the applier communicate through flat path strings like
//! `foo\.bar[0]."true".2[^1]`. This module re-tokenizes such a path into
//! the key and index steps the applier walks. The grammar is exactly what
//! the parser emits:
//!
//! - segments separated by unescaped `.`
//! - `\x` escapes a structural rune inside a bare segment
//! - `"..."` wraps a segment that must stay a string key even when its
//!   body would coerce (`"true"`, `"4"`)
//! - `[N]` indexes, `[]` appends, `[-1]` addresses the last element,
//!   `[^N]` inserts before position N

use crate::coerce::coerce;
use crate::error::{Error, Result};
use crate::value::{MapKey, Value};

/// One step of a path walk.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Descend into a map at this key.
    Key(MapKey),
    /// Descend into a sequence at a fixed index, padding with null.
    At(usize),
    /// Append a new element (`[]`).
    Append,
    /// Address the last existing element (`[-1]`, the slot a previous
    /// append created).
    Last,
    /// Insert a new element before this position (`[^N]`).
    Before(usize),
}

/// Tokenize a canonical path. With `force_string_keys`, bare segments are
/// never coerced and every key is a string.
pub fn parse_path(path: &str, force_string_keys: bool) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    let mut chars = path.char_indices().peekable();
    let mut seg = String::new();
    let mut seg_quoted = false;

    let flush = |steps: &mut Vec<Step>, seg: &mut String, seg_quoted: &mut bool| {
        if !seg.is_empty() || *seg_quoted {
            steps.push(Step::Key(segment_key(seg, *seg_quoted, force_string_keys)));
        }
        seg.clear();
        *seg_quoted = false;
    };

    while let Some((i, c)) = chars.next() {
        match c {
            '.' => flush(&mut steps, &mut seg, &mut seg_quoted),
            '\\' => {
                // Escaped structural rune: keep it literally in the key.
                match chars.next() {
                    Some((_, next)) => seg.push(next),
                    None => seg.push('\\'),
                }
            }
            '"' => {
                seg_quoted = true;
                let mut closed = false;
                loop {
                    match chars.next() {
                        // A '\\' inside quotes escapes exactly the next rune.
                        Some((_, '\\')) => {
                            if let Some((_, escaped)) = chars.next() {
                                seg.push(escaped);
                            }
                        }
                        Some((_, '"')) => {
                            closed = true;
                            break;
                        }
                        Some((_, other)) => seg.push(other),
                        None => break,
                    }
                }
                if !closed {
                    return Err(Error::new(path, i, path.len() - i, "unterminated quoted key"));
                }
            }
            '[' => {
                flush(&mut steps, &mut seg, &mut seg_quoted);
                let mut index = String::new();
                let mut closed = false;
                for (_, q) in chars.by_ref() {
                    if q == ']' {
                        closed = true;
                        break;
                    }
                    index.push(q);
                }
                if !closed {
                    return Err(Error::new(path, i, path.len() - i, "unterminated index"));
                }
                steps.push(parse_index(path, i, &index)?);
            }
            other => seg.push(other),
        }
    }
    flush(&mut steps, &mut seg, &mut seg_quoted);

    Ok(steps)
}

/// Build the key for a finished segment. Quoted segments always stay
/// strings; bare segments coerce to scalar keys unless string keys are
/// forced.
fn segment_key(seg: &str, quoted: bool, force_string_keys: bool) -> MapKey {
    if !quoted && !force_string_keys {
        if let Some(scalar) = coerce(seg) {
            if let Some(key) = MapKey::from_value(&scalar) {
                return key;
            }
        }
    }
    MapKey::String(seg.to_string())
}

fn parse_index(path: &str, offset: usize, index: &str) -> Result<Step> {
    match index {
        "" => Ok(Step::Append),
        "-1" => Ok(Step::Last),
        _ => {
            if let Some(rest) = index.strip_prefix('^') {
                let n: usize = rest.parse().map_err(|_| {
                    Error::new(path, offset, index.len() + 2, "invalid insert index")
                })?;
                Ok(Step::Before(n))
            } else {
                let n: usize = index
                    .parse()
                    .map_err(|_| Error::new(path, offset, index.len() + 2, "invalid index"))?;
                Ok(Step::At(n))
            }
        }
    }
}

/// Test whether a value tree already satisfies every step (used by swap to
/// probe the source location without mutating).
pub fn lookup<'a>(root: &'a Value, steps: &[Step]) -> Option<&'a Value> {
    let mut node = root;
    for step in steps {
        node = match step {
            Step::Key(key) => match node {
                Value::MapStr(m) => m.get(key.as_str()?)?,
                Value::MapAny(m) => m.get(key)?,
                _ => return None,
            },
            Step::At(n) => match node {
                Value::Seq(items) => items.get(*n)?,
                _ => return None,
            },
            Step::Last => match node {
                Value::Seq(items) => items.last()?,
                _ => return None,
            },
            Step::Append | Step::Before(_) => return None,
        };
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_segments_and_indexes() {
        let steps = parse_path("foo.bar[0][]", false).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Key(MapKey::String("foo".into())),
                Step::Key(MapKey::String("bar".into())),
                Step::At(0),
                Step::Append,
            ]
        );
    }

    #[test]
    fn bare_segments_coerce() {
        let steps = parse_path("2.bar.3", false).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Key(MapKey::Int(2)),
                Step::Key(MapKey::String("bar".into())),
                Step::Key(MapKey::Int(3)),
            ]
        );
        let forced = parse_path("2", true).unwrap();
        assert_eq!(forced, vec![Step::Key(MapKey::String("2".into()))]);
    }

    #[test]
    fn quoted_segments_stay_strings() {
        let steps = parse_path("\"true\".\"4\"", false).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Key(MapKey::String("true".into())),
                Step::Key(MapKey::String("4".into())),
            ]
        );
    }

    #[test]
    fn escaped_structural_runes() {
        let steps = parse_path("foo\\.bar", false).unwrap();
        assert_eq!(steps, vec![Step::Key(MapKey::String("foo.bar".into()))]);
    }

    #[test]
    fn insert_last_and_append_forms() {
        let steps = parse_path("a[^3].b[-1]", false).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Key(MapKey::String("a".into())),
                Step::Before(3),
                Step::Key(MapKey::String("b".into())),
                Step::Last,
            ]
        );
    }
}
