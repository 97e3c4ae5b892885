//! The operation applier.
//!
//! Each operation's canonical path is re-tokenized (paths are short) and
//! walked against the tree, materializing whatever containers the walk
//! needs: bare keys create maps, bracket steps create sequences, and a
//! node of the wrong kind is overwritten rather than rejected. Type
//! mismatches are therefore not user-visible errors; only a malformed
//! canonical path (which the parser cannot emit) fails.

use std::collections::HashMap;

use crate::error::Result;
use crate::parse::{Document, Operation, ParseOptions};
use crate::path::{lookup, parse_path, Step};
use crate::value::{MapKey, Value};

impl Document {
    /// Apply the parsed operations to `existing` (or an empty document)
    /// and return the resulting tree.
    pub fn apply(&self, existing: Option<Value>) -> Result<Value> {
        apply(&self.operations, existing, &self.options)
    }
}

/// Apply operations in order, starting from `existing` or null.
pub fn apply(
    ops: &[Operation],
    existing: Option<Value>,
    options: &ParseOptions,
) -> Result<Value> {
    let mut root = existing.unwrap_or(Value::Null);

    for op in ops {
        match op {
            Operation::Set { path, value } => {
                let steps = parse_path(path, options.force_string_keys)?;
                set(&mut root, &steps, value.clone());
            }
            Operation::Delete { path } => {
                let steps = parse_path(path, options.force_string_keys)?;
                delete(&mut root, &steps);
            }
            Operation::Swap { path, source } => {
                let dst = parse_path(path, options.force_string_keys)?;
                let src = parse_path(source, options.force_string_keys)?;

                let src_val = lookup(&root, &src).cloned();
                let dst_val = lookup(&root, &dst).cloned();

                set(&mut root, &dst, src_val.unwrap_or(Value::Null));
                match dst_val {
                    // The destination's old value moves into the source
                    // location; a previously missing destination turns the
                    // swap into a move.
                    Some(old) => set(&mut root, &src, old),
                    None => delete(&mut root, &src),
                }
            }
        }
    }

    Ok(root)
}

/// Parse and apply in one call.
pub fn parse_and_apply(
    input: &str,
    existing: Option<Value>,
    options: ParseOptions,
) -> Result<Value> {
    let mut doc = Document::new(options);
    doc.parse(input)?;
    doc.apply(existing)
}

/// Walk `steps` from `node`, creating containers as needed, and assign
/// `value` at the final location.
fn set(node: &mut Value, steps: &[Step], value: Value) {
    let Some(step) = steps.first() else {
        *node = value;
        return;
    };
    let rest = &steps[1..];

    match step {
        Step::Key(key) => {
            let child = enter_map(node, key);
            set(child, rest, value);
        }
        Step::At(n) => {
            let items = enter_seq(node);
            while items.len() <= *n {
                items.push(Value::Null);
            }
            set(&mut items[*n], rest, value);
        }
        Step::Append => {
            let items = enter_seq(node);
            items.push(Value::Null);
            let last = items.len() - 1;
            set(&mut items[last], rest, value);
        }
        Step::Last => {
            let items = enter_seq(node);
            if items.is_empty() {
                items.push(Value::Null);
            }
            let last = items.len() - 1;
            set(&mut items[last], rest, value);
        }
        Step::Before(n) => {
            let items = enter_seq(node);
            while items.len() < *n {
                items.push(Value::Null);
            }
            let at = (*n).min(items.len());
            items.insert(at, Value::Null);
            set(&mut items[at], rest, value);
        }
    }
}

/// Make `node` a map that can hold `key` and return the slot for it.
/// Promotes `MapStr` to `MapAny` when a non-string key arrives; any
/// non-map node is overwritten with a fresh map of the right flavor.
fn enter_map<'a>(node: &'a mut Value, key: &MapKey) -> &'a mut Value {
    let string_key = matches!(key, MapKey::String(_));

    if let Value::MapStr(m) = node {
        if !string_key {
            let promoted: HashMap<MapKey, Value> = std::mem::take(m)
                .into_iter()
                .map(|(k, v)| (MapKey::String(k), v))
                .collect();
            *node = Value::MapAny(promoted);
        }
    } else if !node.is_map() {
        *node = if string_key {
            Value::MapStr(HashMap::new())
        } else {
            Value::MapAny(HashMap::new())
        };
    }

    match node {
        Value::MapStr(m) => {
            let k = match key {
                MapKey::String(s) => s.clone(),
                other => other.to_string(),
            };
            m.entry(k).or_insert(Value::Null)
        }
        Value::MapAny(m) => m.entry(key.clone()).or_insert(Value::Null),
        _ => unreachable!("enter_map established a map"),
    }
}

/// Make `node` a sequence and return it; non-sequence nodes are replaced.
fn enter_seq(node: &mut Value) -> &mut Vec<Value> {
    if !node.is_seq() {
        *node = Value::Seq(Vec::new());
    }
    match node {
        Value::Seq(items) => items,
        _ => unreachable!("enter_seq established a seq"),
    }
}

/// Remove the value addressed by `steps`, if present. Maps lose the key;
/// sequences splice the element out. Missing intermediate nodes make the
/// whole delete a no-op.
fn delete(node: &mut Value, steps: &[Step]) {
    let Some((step, rest)) = steps.split_first() else {
        *node = Value::Null;
        return;
    };

    match step {
        Step::Key(key) => {
            if rest.is_empty() {
                match node {
                    Value::MapStr(m) => {
                        if let MapKey::String(s) = key {
                            m.remove(s);
                        }
                    }
                    Value::MapAny(m) => {
                        m.remove(key);
                    }
                    _ => {}
                }
                return;
            }
            let child = match node {
                Value::MapStr(m) => match key {
                    MapKey::String(s) => m.get_mut(s),
                    _ => None,
                },
                Value::MapAny(m) => m.get_mut(key),
                _ => None,
            };
            if let Some(child) = child {
                delete(child, rest);
            }
        }
        Step::At(n) => {
            if let Value::Seq(items) = node {
                if *n >= items.len() {
                    return;
                }
                if rest.is_empty() {
                    items.remove(*n);
                } else {
                    delete(&mut items[*n], rest);
                }
            }
        }
        Step::Last => {
            if let Value::Seq(items) = node {
                if items.is_empty() {
                    return;
                }
                if rest.is_empty() {
                    items.pop();
                } else {
                    let last = items.len() - 1;
                    delete(&mut items[last], rest);
                }
            }
        }
        // Appends and inserts never address an existing element.
        Step::Append | Step::Before(_) => {}
    }
}
