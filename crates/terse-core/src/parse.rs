//! The shorthand parser.
//!
//! Parsing does not build a tree. It walks the expression once and emits an
//! ordered list of path-addressed operations (`Set`, `Delete`, `Swap`) that
//! the applier later folds into a value tree. Tokenization is context
//! sensitive: the same rune can be structural in a key, literal in a quoted
//! string, and a terminator in a value, so the parser drives the shared
//! scanner directly rather than running a separate lexing pass.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::coerce::{can_coerce, coerce};
use crate::error::Result;
use crate::scanner::{rune_str, Scanner};
use crate::value::Value;

/// Callback receiving parser/query trace lines.
pub type DebugLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Parser configuration. All flags default to off.
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Materialize every map key as a string; no `MapAny` promotion.
    pub force_string_keys: bool,
    /// Permit `@filename` value tokens (blocking file reads).
    pub enable_file_input: bool,
    /// Recognize `key: value` input without surrounding braces as an
    /// object body.
    pub enable_object_detection: bool,
    /// Optional trace callback.
    pub debug_logger: Option<DebugLogger>,
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("force_string_keys", &self.force_string_keys)
            .field("enable_file_input", &self.enable_file_input)
            .field("enable_object_detection", &self.enable_object_detection)
            .field("debug_logger", &self.debug_logger.is_some())
            .finish()
    }
}

/// A single mutation directive, addressed by canonical path.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Assign `value` at `path`, materializing intermediate containers.
    Set { path: String, value: Value },
    /// Remove the value at `path`.
    Delete { path: String },
    /// Exchange the values at `path` and `source` (both canonical paths).
    Swap { path: String, source: String },
}

impl Operation {
    pub fn path(&self) -> &str {
        match self {
            Operation::Set { path, .. }
            | Operation::Delete { path }
            | Operation::Swap { path, .. } => path,
        }
    }
}

/// A reusable parse/apply context: options plus the operations produced by
/// the most recent [`Document::parse`].
#[derive(Debug, Default)]
pub struct Document {
    pub operations: Vec<Operation>,
    pub(crate) options: ParseOptions,
}

impl Document {
    pub fn new(options: ParseOptions) -> Self {
        Document {
            operations: Vec::new(),
            options,
        }
    }

    /// Parse an expression into operations, replacing any previous ones.
    pub fn parse(&mut self, input: &str) -> Result<()> {
        self.operations.clear();
        let mut parser = Parser {
            sc: Scanner::new(input),
            options: &self.options,
            ops: std::mem::take(&mut self.operations),
        };
        let result = parser.parse_document();
        self.operations = parser.ops;
        result
    }
}

/// Parse an expression with the given options and return its operations.
pub fn parse(input: &str, options: ParseOptions) -> Result<Vec<Operation>> {
    let mut doc = Document::new(options);
    doc.parse(input)?;
    Ok(doc.operations)
}

struct Parser<'a> {
    sc: Scanner<'a>,
    options: &'a ParseOptions,
    ops: Vec<Operation>,
}

impl<'a> Parser<'a> {
    fn debug(&self, f: impl FnOnce() -> String) {
        if let Some(log) = &self.options.debug_logger {
            log(&f());
        }
    }

    fn parse_document(&mut self) -> Result<()> {
        self.sc.skip_whitespace();
        let first = match self.sc.peek() {
            Some(c) => c,
            None => return Ok(()),
        };

        let mut handled = false;
        if self.options.enable_object_detection && !matches!(first, '{' | '[' | '"') {
            // Probe: if the input opens with a key followed by one of the
            // entry forms (`:`, `{`, `^`), treat the whole input as an
            // object body without braces.
            let saved = self.sc.pos();
            let looks_keyed = self
                .parse_prop("", false)
                .map(|_| matches!(self.sc.next(), Some(':' | '{' | '^')))
                .unwrap_or(false);
            self.sc.set_pos(saved);
            if looks_keyed {
                self.debug(|| "Detected object body without braces".to_string());
                self.parse_object("".to_string())?;
                handled = true;
            }
        }

        if !handled {
            self.parse_value("".to_string(), true, false)?;
        }

        self.sc.skip_whitespace();
        if !self.sc.at_eof() {
            let found = rune_str(self.sc.peek());
            return Err(self
                .sc
                .error(1, format!("Expected end of input but found {found}")));
        }
        Ok(())
    }

    /// Parse a bracketed index into the buffer, e.g. `[3]`, `[]`, `[^1]`,
    /// `[-1]`. The opening bracket is already in the buffer.
    fn parse_index(&mut self) -> Result<()> {
        loop {
            match self.sc.next() {
                Some(c @ ('0'..='9' | '.' | '-' | '^')) => self.sc.buf.push(c),
                Some(_) => {
                    self.sc.back();
                    break;
                }
                None => break,
            }
        }

        if self.sc.expect(']') {
            self.sc.buf.push(']');
            Ok(())
        } else {
            let found = rune_str(self.sc.next());
            Err(self.sc.error(1, format!("Expected ']' but found {found}")))
        }
    }

    /// Parse a key into a canonical path segment appended to `path`.
    ///
    /// Bare names stop at structural runes; `\`-escapes keep their
    /// backslash so the applier can undo them; quoted names are unwrapped
    /// unless their body would coerce, in which case the quotes survive
    /// into the canonical path to pin the key as a string.
    fn parse_prop(&mut self, path: &str, comma_stop: bool) -> Result<String> {
        let start = self.sc.pos();
        self.sc.skip_whitespace();
        self.sc.buf.clear();

        loop {
            let r = self.sc.next();

            match r {
                Some('[') => {
                    self.sc.buf.push('[');
                    self.parse_index()?;
                    continue;
                }
                None | Some(':' | '{' | '}' | '^') => {
                    self.sc.back();
                    break;
                }
                Some(',') if comma_stop => {
                    self.sc.back();
                    break;
                }
                Some('"') => {
                    self.sc.parse_quoted(true)?;
                    let mut prop = std::mem::take(&mut self.sc.buf);
                    if can_coerce(&prop) {
                        // Keep the quotes so the key stays a string.
                        prop = format!("\"{prop}\"");
                    }
                    if path.is_empty() {
                        return Ok(prop);
                    }
                    return Ok(format!("{path}.{prop}"));
                }
                Some('\\') => {
                    if self.sc.parse_escape(false, true) {
                        continue;
                    }
                    self.sc.buf.push('\\');
                }
                Some(c) => self.sc.buf.push(c),
            }
        }

        let name = self.sc.buf.trim();
        let prop = if path.is_empty() {
            name.to_string()
        } else {
            format!("{path}.{name}")
        };

        self.debug(|| format!("Setting key {prop}"));

        if prop.is_empty() {
            let width = self.sc.pos() - start;
            return Err(self
                .sc
                .error(width, "expected at least one property name"));
        }

        Ok(prop)
    }

    /// Parse an object body (entries up to an unconsumed `}` or EOF).
    /// `path` is the canonical prefix all entries extend; after each entry
    /// any live `[]` in the prefix is rewritten to `[-1]` so sibling keys
    /// address the slot the first entry appended instead of appending
    /// again.
    fn parse_object(&mut self, mut path: String) -> Result<()> {
        self.sc.skip_whitespace();
        if self.sc.peek() == Some('}') {
            // Empty object.
            self.ops.push(Operation::Set {
                path: path.clone(),
                value: Value::MapStr(Default::default()),
            });
        }

        loop {
            self.sc.skip_whitespace();
            match self.sc.peek() {
                None | Some('}') => break,
                Some(',') => {
                    self.sc.next();
                }
                _ => {}
            }

            let prop = self.parse_prop(&path, false)?;
            match self.sc.next() {
                Some('{') => {
                    // `a{b: 1}` is sugar for `a: {b: 1}`; hand the brace
                    // back to the value parser.
                    self.sc.back();
                }
                Some('^') => {
                    let source = self.parse_prop("", true)?;
                    self.ops.push(Operation::Swap { path: prop, source });
                    continue;
                }
                r => {
                    if r != Some(':') {
                        return Err(self
                            .sc
                            .error(1, format!("Expected colon but got {}", rune_str(r))));
                    }
                }
            }

            self.parse_value(prop, true, true)?;

            if path.contains("[]") {
                // Subsequent entries must not append again.
                path = path.replace("[]", "[-1]");
            }
        }
        Ok(())
    }

    /// Parse a value for `path`: an object, an array, a quoted string, or
    /// a raw token (coerced unless `coerce` is off). `terminate_comma`
    /// bounds raw tokens at commas, which is on everywhere except the
    /// top-level document position.
    fn parse_value(&mut self, path: String, coerce_value: bool, terminate_comma: bool) -> Result<()> {
        self.sc.skip_whitespace();
        self.sc.buf.clear();
        let mut start = self.sc.pos();
        let mut can_slice = true;
        let mut first = true;

        loop {
            let r = self.sc.next();

            if r == Some('\\') && self.sc.parse_escape(false, false) {
                can_slice = false;
                first = false;
                continue;
            }

            if first {
                match r {
                    Some('{') => {
                        self.debug(|| "Parsing sub-object".to_string());
                        start = self.sc.pos();
                        self.parse_object(path)?;
                        self.debug(|| "Sub-object done".to_string());
                        if !self.sc.expect('}') {
                            let width = self.sc.pos().saturating_sub(start);
                            let found = rune_str(self.sc.peek());
                            return Err(self
                                .sc
                                .error(width, format!("Expected '}}' but found {found}")));
                        }
                        return Ok(());
                    }
                    Some('[') => {
                        self.debug(|| "Parsing sub-array".to_string());
                        self.parse_array(path)?;
                        self.debug(|| "Sub-array done".to_string());
                        return Ok(());
                    }
                    Some('"') => {
                        self.sc.parse_quoted(false)?;
                        let value = std::mem::take(&mut self.sc.buf);
                        self.debug(|| format!("Parse value: {value}"));
                        self.ops.push(Operation::Set {
                            path,
                            value: Value::String(value),
                        });
                        return Ok(());
                    }
                    _ => {}
                }
            }
            first = false;

            let terminated = match r {
                None | Some('}' | ']') => {
                    self.sc.back();
                    true
                }
                Some('\n') => {
                    self.sc.skip_whitespace();
                    true
                }
                Some(',') if terminate_comma => {
                    self.sc.back();
                    true
                }
                _ => false,
            };

            if terminated {
                let raw = if can_slice {
                    self.sc.slice(start, self.sc.pos()).trim()
                } else {
                    self.sc.buf.trim()
                };
                let value = raw.to_string();
                return self.finish_raw_value(path, value, coerce_value);
            }

            if let Some(c) = r {
                self.sc.buf.push(c);
            }
        }
    }

    /// Parse an array literal; each element emits operations at
    /// `path[idx]`, with the live-`[]` rewrite applied between elements.
    fn parse_array(&mut self, mut path: String) -> Result<()> {
        self.sc.skip_whitespace();
        if self.sc.peek() == Some(']') {
            self.debug(|| "Parse value: []".to_string());
            self.ops.push(Operation::Set {
                path,
                value: Value::Seq(Vec::new()),
            });
            self.sc.next();
            return Ok(());
        }

        let mut idx = 0usize;
        loop {
            if idx > 0 && path.contains("[]") {
                path = path.replace("[]", "[-1]");
            }
            self.parse_value(format!("{path}[{idx}]"), true, true)?;

            self.sc.skip_whitespace();
            match self.sc.peek() {
                Some(']') => {
                    self.sc.next();
                    return Ok(());
                }
                Some(',') => {
                    self.sc.next();
                }
                other => {
                    return Err(self.sc.error(
                        1,
                        format!("Expected ',' or ']' but found '{}'", rune_str(other)),
                    ));
                }
            }
            idx += 1;
        }
    }

    /// Turn a finished raw token into an operation: file include, base64,
    /// `undefined` deletion, coercion, or a plain string.
    fn finish_raw_value(&mut self, path: String, value: String, coerce_value: bool) -> Result<()> {
        if coerce_value && !value.is_empty() {
            if self.options.enable_file_input && value.len() > 1 && value.starts_with('@') {
                return self.finish_file_value(path, &value);
            }

            if let Some(encoded) = value.strip_prefix('%') {
                let binary = BASE64.decode(encoded).map_err(|e| {
                    self.sc
                        .error(value.len(), format!("Unable to Base64 decode: {e}"))
                })?;
                self.debug(|| format!("Parse value: {binary:?}"));
                self.ops.push(Operation::Set {
                    path,
                    value: Value::Bytes(binary),
                });
                return Ok(());
            }

            if value == "undefined" {
                self.debug(|| "Unsetting value".to_string());
                self.ops.push(Operation::Delete { path });
                return Ok(());
            }

            if let Some(coerced) = coerce(&value) {
                self.debug(|| format!("Parse value: {coerced:?}"));
                self.ops.push(Operation::Set {
                    path,
                    value: coerced,
                });
                return Ok(());
            }
        }

        self.debug(|| format!("Parse value: {value}"));
        self.ops.push(Operation::Set {
            path,
            value: Value::String(value),
        });
        Ok(())
    }

    /// `@filename`: read the file and decode it by suffix. JSON and CBOR
    /// decode into a structured value; anything else lands as a string
    /// when valid UTF-8 and as bytes otherwise.
    fn finish_file_value(&mut self, path: String, token: &str) -> Result<()> {
        let filename = &token[1..];
        self.debug(|| format!("Found file {filename}"));

        let data = std::fs::read(filename).map_err(|e| {
            self.sc
                .error(token.len(), format!("Unable to read file: {e}"))
        })?;

        let value = if filename.ends_with(".json") {
            let structured: serde_json::Value = serde_json::from_slice(&data).map_err(|e| {
                self.sc
                    .error(token.len(), format!("Unable to unmarshal JSON: {e}"))
            })?;
            Value::from(structured)
        } else if filename.ends_with(".cbor") {
            let structured: ciborium::Value =
                ciborium::from_reader(data.as_slice()).map_err(|e| {
                    self.sc
                        .error(token.len(), format!("Unable to unmarshal CBOR: {e}"))
                })?;
            let mut value = Value::from_cbor(structured);
            if self.options.force_string_keys {
                value = value.into_string_keys();
            }
            value
        } else {
            match String::from_utf8(data) {
                Ok(text) => Value::String(text),
                Err(err) => Value::Bytes(err.into_bytes()),
            }
        };

        self.debug(|| format!("Parse value: {value:?}"));
        self.ops.push(Operation::Set { path, value });
        Ok(())
    }
}
