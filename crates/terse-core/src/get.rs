//! The query engine.
//!
//! `get_path` runs a query string against a value tree and returns the
//! selected sub-tree plus a found flag. The query language shares the
//! parser's scanner and coercion: bare names are map lookups (broadcast
//! element-wise over sequences), `*` selects all map values, `..name`
//! collects recursively, `[...]` indexes, slices, flattens, or filters,
//! `{...}` projects a new map, and `|` pipes the running result into the
//! rest of the query.
//!
//! Broadcasting replays the remaining query once per element by saving and
//! restoring the scanner position, so no query AST is ever built.

use std::collections::HashMap;

use crate::coerce::coerce;
use crate::error::{Error, Result};
use crate::expr;
use crate::parse::DebugLogger;
use crate::scanner::Scanner;
use crate::value::{MapKey, Value};

/// Query configuration.
#[derive(Clone, Default)]
pub struct GetOptions {
    /// Optional trace callback.
    pub debug_logger: Option<DebugLogger>,
}

/// Run `query` against `input`. Returns the selected value and whether the
/// final lookup found anything. The empty query selects `input` itself
/// (with `found` false, since nothing was looked up).
pub fn get_path(query: &str, input: &Value, options: GetOptions) -> Result<(Value, bool)> {
    let mut q = Query {
        sc: Scanner::new(query),
        options: &options,
    };
    let mut result = input.clone();
    let mut found = false;

    loop {
        q.sc.skip_whitespace();
        if q.sc.at_eof() {
            break;
        }
        let (next, next_found) = q.get_path(&result)?;
        result = next;
        found = next_found;
        if q.sc.peek() == Some('|') {
            q.sc.next();
        }
    }

    Ok((result, found))
}

/// Terminators that end a bare name in a query.
const NAME_TERMINATORS: &[char] = &['.', '[', '|', ',', '}'];

struct Query<'a> {
    sc: Scanner<'a>,
    options: &'a GetOptions,
}

impl<'a> Query<'a> {
    fn debug(&self, f: impl FnOnce() -> String) {
        if let Some(log) = &self.options.debug_logger {
            log(&f());
        }
    }

    /// Evaluate one pipeline segment (up to `|` or EOF) against `input`.
    fn get_path(&mut self, input: &Value) -> Result<(Value, bool)> {
        let mut current = input.clone();
        let mut found = false;

        loop {
            match self.sc.peek() {
                None | Some('|') => break,
                Some(c) if c.is_whitespace() => {
                    self.sc.skip_whitespace();
                }
                Some('[') => {
                    let bracket_pos = self.sc.pos();
                    self.sc.next();
                    if self.sc.peek() == Some(']') {
                        // Flatten one level: [[1, 2], 3, [[4]]] => [1, 2, 3, [4]]
                        self.sc.next();
                        current = flatten(&current);
                        found = true;
                        continue;
                    }
                    let (next, next_found) = self.get_index(&current, bracket_pos)?;
                    current = next;
                    found = next_found;
                }
                Some('.') => {
                    self.sc.next();
                    if self.sc.peek() == Some('.') {
                        self.sc.next();
                        current = self.get_recursive(&current)?;
                        found = true;
                    }
                }
                Some('{') => {
                    self.sc.next();
                    current = self.get_fields(&current)?;
                    found = true;
                }
                _ => {
                    let (next, next_found) = self.get_prop(&current)?;
                    current = next;
                    found = next_found;
                }
            }
        }

        Ok((current, found))
    }

    /// Bare-name lookup. A sequence broadcasts the whole remaining segment
    /// over its elements, dropping elements where the lookup found
    /// nothing.
    fn get_prop(&mut self, input: &Value) -> Result<(Value, bool)> {
        if let Value::Seq(items) = input {
            let saved = self.sc.pos();
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                self.sc.set_pos(saved);
                let (v, item_found) = self.get_path(item)?;
                if item_found {
                    out.push(v);
                }
            }
            if items.is_empty() {
                // Still consume the rest of the segment.
                self.sc.set_pos(saved);
                self.get_path(&Value::MapStr(HashMap::new()))?;
            }
            return Ok((Value::Seq(out), true));
        }

        let (key, quoted) = self.parse_name()?;

        self.debug(|| format!("Getting key '{key}'"));

        if !quoted && key == "*" {
            return Ok(wildcard(input));
        }

        let map_key = if quoted {
            MapKey::String(key)
        } else {
            coerce(&key)
                .and_then(|v| MapKey::from_value(&v))
                .unwrap_or(MapKey::String(key))
        };

        let value = match input {
            Value::MapStr(m) => match &map_key {
                MapKey::String(s) => m.get(s),
                _ => None,
            },
            Value::MapAny(m) => m.get(&map_key),
            _ => None,
        };

        match value {
            Some(v) => Ok((v.clone(), true)),
            None => Ok((Value::Null, false)),
        }
    }

    /// Parse a bare or quoted name up to the next structural rune.
    fn parse_name(&mut self) -> Result<(String, bool)> {
        self.sc.skip_whitespace();
        let start = self.sc.pos();
        let (quoted, can_slice) = self.sc.parse_until(0, false, NAME_TERMINATORS)?;
        let name = if can_slice {
            self.sc.slice(start, self.sc.pos()).to_string()
        } else {
            self.sc.buf.clone()
        };
        Ok((name, quoted))
    }

    /// `[...]` after the opening bracket: an integer index, a slice, or a
    /// predicate filter.
    fn get_index(&mut self, input: &Value, bracket_pos: usize) -> Result<(Value, bool)> {
        self.sc.skip_whitespace();
        let start = self.sc.pos();
        let (_, can_slice) = self.sc.parse_until(1, true, &['|'])?;
        let body = if can_slice {
            self.sc.slice(start, self.sc.pos()).to_string()
        } else {
            self.sc.buf.clone()
        };

        if !self.sc.expect(']') {
            let width = self.sc.pos().saturating_sub(bracket_pos);
            return Err(self.sc.error_at(
                bracket_pos,
                width,
                "expected ']' after index or filter",
            ));
        }

        let trimmed = body.trim();

        if let Ok(index) = trimmed.parse::<i64>() {
            return Ok(index_single(input, index));
        }

        if let Some((lo, hi)) = parse_slice_bounds(trimmed) {
            return Ok(slice_value(input, lo, hi));
        }

        // A predicate filter, optionally prefixed with '?'.
        let filter = trimmed.strip_prefix('?').unwrap_or(trimmed);
        let filter_offset = start + (body.len() - body.trim_start().len());
        self.get_filtered(filter, filter_offset, input)
    }

    /// Apply a predicate filter to each element of a sequence; for each
    /// truthy element, the rest of the segment is applied and the result
    /// collected. Elements whose evaluation errors are skipped.
    fn get_filtered(
        &mut self,
        filter: &str,
        filter_offset: usize,
        input: &Value,
    ) -> Result<(Value, bool)> {
        let ast = expr::parse(filter).map_err(|e| {
            Error::new(
                self.sc.source(),
                filter_offset + e.offset,
                e.length,
                e.message,
            )
        })?;

        let Value::Seq(items) = input else {
            return Ok((Value::Null, false));
        };

        let saved = self.sc.pos();
        let mut results = Vec::new();
        for item in items {
            let verdict = match expr::evaluate(&ast, item) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if verdict == Value::Bool(true) {
                self.sc.set_pos(saved);
                let (out, _) = self.get_path(item)?;
                results.push(out);
            }
        }
        if results.is_empty() {
            // Consume the rest of the segment so the pipeline stays aligned.
            self.sc.set_pos(saved);
            self.get_path(&Value::MapStr(HashMap::new()))?;
            return Ok((Value::Seq(Vec::new()), true));
        }
        Ok((Value::Seq(results), true))
    }

    /// `..name`: collect every value stored under `name` anywhere in the
    /// subtree. Map keys are visited in sorted order so the result is
    /// deterministic; sequences contribute in element order.
    fn get_recursive(&mut self, input: &Value) -> Result<Value> {
        let (name, _) = self.parse_name()?;
        self.debug(|| format!("Collecting '{name}' recursively"));
        let mut out = Vec::new();
        collect_recursive(input, &name, &mut out);
        Ok(Value::Seq(out))
    }

    /// `{...}` projection after the opening brace: build a string-keyed
    /// map from field specs. `name` copies a field; `alias: path` runs a
    /// sub-query against the current node. A sequence broadcasts the
    /// projection over its elements.
    fn get_fields(&mut self, input: &Value) -> Result<Value> {
        if let Value::Seq(items) = input {
            let saved = self.sc.pos();
            if items.is_empty() {
                // Consume the projection body against an empty map.
                self.get_fields(&Value::MapStr(HashMap::new()))?;
                return Ok(Value::Seq(Vec::new()));
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                self.sc.set_pos(saved);
                out.push(self.get_fields(item)?);
            }
            return Ok(Value::Seq(out));
        }

        if !input.is_map() {
            return Err(self.sc.error(
                1,
                format!("field selection requires a map, but found {}", input.kind()),
            ));
        }

        self.sc.buf.clear();
        let mut result: HashMap<String, Value> = HashMap::new();
        let mut key = String::new();
        let mut open = 1;
        self.sc.skip_whitespace();

        loop {
            let r = self.sc.next();

            match r {
                None => break,
                Some('"') => {
                    self.sc.buf.push('"');
                    self.sc.parse_quoted(true)?;
                    self.sc.buf.push('"');
                    continue;
                }
                Some('\\') => {
                    if self.sc.parse_escape(false, true) {
                        continue;
                    }
                }
                Some(':') if open == 1 => {
                    key = self.sc.buf.trim().to_string();
                    self.sc.buf.clear();
                    self.sc.skip_whitespace();
                    continue;
                }
                Some('{') => open += 1,
                Some('}') => open -= 1,
                _ => {}
            }

            if (r == Some(',') && open == 1) || open == 0 {
                let path = self.sc.buf.trim().to_string();
                if key.is_empty() {
                    // Plain field copy.
                    let value = match input {
                        Value::MapStr(m) => m.get(&path).cloned(),
                        Value::MapAny(m) => m.get(&MapKey::String(path.clone())).cloned(),
                        _ => None,
                    };
                    result.insert(path, value.unwrap_or(Value::Null));
                } else {
                    let (value, _) = get_path(
                        &path,
                        input,
                        GetOptions {
                            debug_logger: self.options.debug_logger.clone(),
                        },
                    )?;
                    result.insert(std::mem::take(&mut key), value);
                }
                if open == 0 {
                    break;
                }
                key.clear();
                self.sc.buf.clear();
                self.sc.skip_whitespace();
                continue;
            }

            if let Some(c) = r {
                self.sc.buf.push(c);
            }
        }

        Ok(Value::MapStr(result))
    }
}

/// All values of a map, in sorted key order.
fn wildcard(input: &Value) -> (Value, bool) {
    match input {
        Value::MapStr(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            let values = keys.into_iter().map(|k| m[k].clone()).collect();
            (Value::Seq(values), true)
        }
        Value::MapAny(m) => {
            let mut entries: Vec<(String, &Value)> =
                m.iter().map(|(k, v)| (k.to_string(), v)).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let values = entries.into_iter().map(|(_, v)| v.clone()).collect();
            (Value::Seq(values), true)
        }
        _ => (Value::Null, false),
    }
}

/// Concatenate one level of nesting; non-sequence elements pass through.
fn flatten(input: &Value) -> Value {
    match input {
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Seq(inner) => out.extend(inner.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Seq(out)
        }
        _ => Value::Null,
    }
}

fn collect_recursive(value: &Value, name: &str, out: &mut Vec<Value>) {
    match value {
        Value::Seq(items) => {
            for item in items {
                collect_recursive(item, name, out);
            }
        }
        Value::MapStr(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            for k in keys {
                if k == name {
                    out.push(m[k].clone());
                }
                collect_recursive(&m[k], name, out);
            }
        }
        Value::MapAny(m) => {
            let mut entries: Vec<(String, &Value)> =
                m.iter().map(|(k, v)| (k.to_string(), v)).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (k, v) in entries {
                if k == name {
                    out.push(v.clone());
                }
                collect_recursive(v, name, out);
            }
        }
        _ => {}
    }
}

/// Single-index access on sequences, strings (by rune), and byte strings.
/// Negative indexes wrap from the end; out of range is not-found.
fn index_single(input: &Value, index: i64) -> (Value, bool) {
    match input {
        Value::Seq(items) => match wrap_index(index, items.len()) {
            Some(i) => (items[i].clone(), true),
            None => (Value::Null, false),
        },
        Value::String(s) => {
            let count = s.chars().count();
            match wrap_index(index, count) {
                Some(i) => (
                    Value::String(s.chars().nth(i).map(String::from).unwrap_or_default()),
                    true,
                ),
                None => (Value::Null, false),
            }
        }
        Value::Bytes(b) => match wrap_index(index, b.len()) {
            Some(i) => (Value::Int(b[i] as i64), true),
            None => (Value::Null, false),
        },
        _ => (Value::Null, false),
    }
}

fn wrap_index(index: i64, len: usize) -> Option<usize> {
    let index = if index < 0 { index + len as i64 } else { index };
    (0..len as i64).contains(&index).then_some(index as usize)
}

/// `S:E` with optional integer endpoints; anything else is a filter.
fn parse_slice_bounds(body: &str) -> Option<(Option<i64>, Option<i64>)> {
    let (lo, hi) = body.split_once(':')?;
    let parse = |s: &str| -> Option<Option<i64>> {
        let s = s.trim();
        if s.is_empty() {
            return Some(None);
        }
        s.parse::<i64>().ok().map(Some)
    };
    Some((parse(lo)?, parse(hi)?))
}

/// Inclusive slice with clamping: stop past the end truncates, negative
/// endpoints wrap. Strings slice by rune, byte strings by octet.
fn slice_value(input: &Value, lo: Option<i64>, hi: Option<i64>) -> (Value, bool) {
    fn bounds(lo: Option<i64>, hi: Option<i64>, len: usize) -> Option<(usize, usize)> {
        let n = len as i64;
        let mut lo = lo.unwrap_or(0);
        if lo < 0 {
            lo += n;
        }
        let lo = lo.clamp(0, n);
        let mut hi = hi.unwrap_or(n - 1);
        if hi < 0 {
            hi += n;
        }
        let hi = hi.min(n - 1);
        if lo > hi {
            return None;
        }
        Some((lo as usize, hi as usize))
    }

    match input {
        Value::Seq(items) => {
            let out = match bounds(lo, hi, items.len()) {
                Some((a, b)) => items[a..=b].to_vec(),
                None => Vec::new(),
            };
            (Value::Seq(out), true)
        }
        Value::String(s) => {
            let runes: Vec<char> = s.chars().collect();
            let out = match bounds(lo, hi, runes.len()) {
                Some((a, b)) => runes[a..=b].iter().collect(),
                None => String::new(),
            };
            (Value::String(out), true)
        }
        Value::Bytes(bytes) => {
            let out = match bounds(lo, hi, bytes.len()) {
                Some((a, b)) => bytes[a..=b].to_vec(),
                None => Vec::new(),
            };
            (Value::Bytes(out), true)
        }
        _ => (Value::Null, false),
    }
}
