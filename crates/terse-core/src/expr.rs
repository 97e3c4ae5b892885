//! The predicate expression language used inside `[...]` query filters.
//!
//! A deliberately small Pratt-parsed language: comparisons, boolean
//! connectives, the string tests `startsWith`/`endsWith`/`contains`,
//! numeric and string literals, `@` for the element under test, field
//! access, and indexing. An identifier that matches no field evaluates to
//! its own name as a string, which is what lets `tags[@ startsWith a]`
//! read naturally without quoting `a`.
//!
//! Errors carry byte offsets relative to the expression source so the
//! query engine can shift them into the host query.

use std::fmt;

use crate::value::Value;

/// Error local to an expression; `offset`/`length` are relative to the
/// expression source handed to [`parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExprError {
    pub message: String,
    pub offset: usize,
    pub length: usize,
}

impl ExprError {
    fn new(message: impl Into<String>, offset: usize, length: usize) -> Self {
        ExprError {
            message: message.into(),
            offset,
            length: length.max(1),
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type ExprResult<T> = std::result::Result<T, ExprError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    StartsWith,
    EndsWith,
    Contains,
}

impl BinaryOp {
    /// Left binding power; higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne => 3,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
            BinaryOp::StartsWith | BinaryOp::EndsWith | BinaryOp::Contains => 5,
        }
    }
}

/// Parsed expression node, annotated with its source span.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// `@` — the element under test.
    This { offset: usize },
    Literal {
        value: Value,
        offset: usize,
        length: usize,
    },
    /// Bare identifier: field access on the element, falling back to the
    /// identifier text as a string.
    Ident {
        name: String,
        offset: usize,
    },
    /// `expr.field`
    Field {
        base: Box<Ast>,
        name: String,
        offset: usize,
    },
    /// `expr[expr]`
    Index {
        base: Box<Ast>,
        index: Box<Ast>,
        offset: usize,
    },
    Not {
        operand: Box<Ast>,
        offset: usize,
    },
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Op(BinaryOp),
    Not,
    At,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
    length: usize,
}

fn lex(src: &str) -> ExprResult<Vec<Spanned>> {
    let mut out = Vec::new();
    let bytes = src.as_bytes();
    let mut chars = src.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let simple = match c {
            '@' => Some(Token::At),
            '.' => Some(Token::Dot),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            _ => None,
        };
        if let Some(token) = simple {
            chars.next();
            out.push(Spanned {
                token,
                offset: i,
                length: 1,
            });
            continue;
        }

        match c {
            '=' | '!' | '<' | '>' => {
                chars.next();
                let has_eq = chars.peek().is_some_and(|&(_, n)| n == '=');
                let (token, length) = match (c, has_eq) {
                    ('=', true) => (Token::Op(BinaryOp::Eq), 2),
                    ('!', true) => (Token::Op(BinaryOp::Ne), 2),
                    ('<', true) => (Token::Op(BinaryOp::Le), 2),
                    ('>', true) => (Token::Op(BinaryOp::Ge), 2),
                    ('<', false) => (Token::Op(BinaryOp::Lt), 1),
                    ('>', false) => (Token::Op(BinaryOp::Gt), 1),
                    (other, _) => {
                        return Err(ExprError::new(
                            format!("unexpected character '{other}'"),
                            i,
                            1,
                        ))
                    }
                };
                if length == 2 {
                    chars.next();
                }
                out.push(Spanned {
                    token,
                    offset: i,
                    length,
                });
            }
            '"' => {
                chars.next();
                let mut body = String::new();
                let mut closed = false;
                for (_, q) in chars.by_ref() {
                    match q {
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => body.push(other),
                    }
                }
                if !closed {
                    return Err(ExprError::new("unterminated string", i, src.len() - i));
                }
                let length = body.len() + 2;
                out.push(Spanned {
                    token: Token::Str(body),
                    offset: i,
                    length,
                });
            }
            '0'..='9' => {
                let start = i;
                let mut end = i;
                while let Some(&(j, n)) = chars.peek() {
                    if n.is_ascii_digit() || n == '.' || n == 'e' || n == 'E' || n == '+' {
                        // '.' only continues a number when a digit follows;
                        // otherwise it is field access on the literal.
                        if n == '.' && !bytes.get(j + 1).is_some_and(|b| b.is_ascii_digit()) {
                            break;
                        }
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &src[start..end.max(start + c.len_utf8())];
                let token = if text.contains(['.', 'e', 'E']) {
                    Token::Float(text.parse().map_err(|_| {
                        ExprError::new("invalid number", start, text.len())
                    })?)
                } else {
                    Token::Int(text.parse().map_err(|_| {
                        ExprError::new("invalid number", start, text.len())
                    })?)
                };
                out.push(Spanned {
                    token,
                    offset: start,
                    length: text.len(),
                });
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                let mut end = i + c.len_utf8();
                chars.next();
                while let Some(&(j, n)) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &src[start..end];
                let token = match word {
                    "and" => Token::Op(BinaryOp::And),
                    "or" => Token::Op(BinaryOp::Or),
                    "not" => Token::Not,
                    "startsWith" => Token::Op(BinaryOp::StartsWith),
                    "endsWith" => Token::Op(BinaryOp::EndsWith),
                    "contains" => Token::Op(BinaryOp::Contains),
                    "null" => Token::Null,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(word.to_string()),
                };
                out.push(Spanned {
                    token,
                    offset: start,
                    length: word.len(),
                });
            }
            other => {
                return Err(ExprError::new(
                    format!("unexpected character '{other}'"),
                    i,
                    other.len_utf8(),
                ))
            }
        }
    }

    Ok(out)
}

/// Parse an expression into an AST.
pub fn parse(src: &str) -> ExprResult<Ast> {
    let tokens = lex(src)?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        src_len: src.len(),
    };
    let ast = parser.expression(0)?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::new(
            "unexpected trailing input",
            extra.offset,
            extra.length,
        ));
    }
    Ok(ast)
}

struct ExprParser {
    tokens: Vec<Spanned>,
    pos: usize,
    src_len: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eof_error(&self, message: &str) -> ExprError {
        ExprError::new(message, self.src_len, 1)
    }

    fn expression(&mut self, min_precedence: u8) -> ExprResult<Ast> {
        let mut left = self.prefix()?;

        while let Some(spanned) = self.peek() {
            let (op, offset) = match spanned.token {
                Token::Op(op) => (op, spanned.offset),
                _ => break,
            };
            if op.precedence() <= min_precedence {
                break;
            }
            self.next();
            let right = self.expression(op.precedence())?;
            left = Ast::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                offset,
            };
        }

        Ok(left)
    }

    fn prefix(&mut self) -> ExprResult<Ast> {
        let spanned = self
            .next()
            .ok_or_else(|| self.eof_error("expected expression"))?;
        let node = match spanned.token {
            Token::At => Ast::This {
                offset: spanned.offset,
            },
            Token::Null => Ast::Literal {
                value: Value::Null,
                offset: spanned.offset,
                length: spanned.length,
            },
            Token::Bool(b) => Ast::Literal {
                value: Value::Bool(b),
                offset: spanned.offset,
                length: spanned.length,
            },
            Token::Int(i) => Ast::Literal {
                value: Value::Int(i),
                offset: spanned.offset,
                length: spanned.length,
            },
            Token::Float(f) => Ast::Literal {
                value: Value::Float(f),
                offset: spanned.offset,
                length: spanned.length,
            },
            Token::Str(s) => Ast::Literal {
                value: Value::String(s),
                offset: spanned.offset,
                length: spanned.length,
            },
            Token::Ident(name) => Ast::Ident {
                name,
                offset: spanned.offset,
            },
            Token::Not => {
                let operand = self.expression(6)?;
                Ast::Not {
                    operand: Box::new(operand),
                    offset: spanned.offset,
                }
            }
            Token::LParen => {
                let inner = self.expression(0)?;
                match self.next() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => inner,
                    Some(other) => {
                        return Err(ExprError::new("expected ')'", other.offset, other.length))
                    }
                    None => return Err(self.eof_error("expected ')'")),
                }
            }
            _ => {
                return Err(ExprError::new(
                    "expected expression",
                    spanned.offset,
                    spanned.length,
                ))
            }
        };
        self.postfix(node)
    }

    fn postfix(&mut self, mut node: Ast) -> ExprResult<Ast> {
        loop {
            match self.peek().map(|s| (s.token.clone(), s.offset)) {
                Some((Token::Dot, offset)) => {
                    self.next();
                    match self.next() {
                        Some(Spanned {
                            token: Token::Ident(name),
                            ..
                        }) => {
                            node = Ast::Field {
                                base: Box::new(node),
                                name,
                                offset,
                            };
                        }
                        Some(other) => {
                            return Err(ExprError::new(
                                "expected field name after '.'",
                                other.offset,
                                other.length,
                            ))
                        }
                        None => return Err(self.eof_error("expected field name after '.'")),
                    }
                }
                Some((Token::LBracket, offset)) => {
                    self.next();
                    let index = self.expression(0)?;
                    match self.next() {
                        Some(Spanned {
                            token: Token::RBracket,
                            ..
                        }) => {
                            node = Ast::Index {
                                base: Box::new(node),
                                index: Box::new(index),
                                offset,
                            };
                        }
                        Some(other) => {
                            return Err(ExprError::new("expected ']'", other.offset, other.length))
                        }
                        None => return Err(self.eof_error("expected ']'")),
                    }
                }
                _ => return Ok(node),
            }
        }
    }
}

/// Evaluate an expression against the element under test.
pub fn evaluate(ast: &Ast, this: &Value) -> ExprResult<Value> {
    match ast {
        Ast::This { .. } => Ok(this.clone()),
        Ast::Literal { value, .. } => Ok(value.clone()),
        Ast::Ident { name, .. } => {
            // Field access with unquoted-string fallback.
            Ok(field(this, name).unwrap_or_else(|| Value::String(name.clone())))
        }
        Ast::Field { base, name, offset } => {
            let base = evaluate(base, this)?;
            field(&base, name).ok_or_else(|| {
                ExprError::new(
                    format!("no field '{}' on {}", name, base.kind()),
                    *offset,
                    name.len() + 1,
                )
            })
        }
        Ast::Index {
            base,
            index,
            offset,
        } => {
            let base = evaluate(base, this)?;
            let idx = evaluate(index, this)?;
            index_value(&base, &idx)
                .ok_or_else(|| ExprError::new(format!("cannot index {}", base.kind()), *offset, 1))
        }
        Ast::Not { operand, .. } => {
            let v = evaluate(operand, this)?;
            Ok(Value::Bool(!v.is_truthy()))
        }
        Ast::Binary {
            op,
            left,
            right,
            offset,
        } => {
            match op {
                BinaryOp::And => {
                    let l = evaluate(left, this)?;
                    if !l.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    let r = evaluate(right, this)?;
                    return Ok(Value::Bool(r.is_truthy()));
                }
                BinaryOp::Or => {
                    let l = evaluate(left, this)?;
                    if l.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    let r = evaluate(right, this)?;
                    return Ok(Value::Bool(r.is_truthy()));
                }
                _ => {}
            }

            let l = evaluate(left, this)?;
            let r = evaluate(right, this)?;
            binary(*op, &l, &r, *offset)
        }
    }
}

/// Parse and evaluate in one step.
pub fn parse_and_evaluate(src: &str, this: &Value) -> ExprResult<Value> {
    let ast = parse(src)?;
    evaluate(&ast, this)
}

fn field(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::MapStr(m) => m.get(name).cloned(),
        Value::MapAny(m) => m
            .iter()
            .find(|(k, _)| k.as_str() == Some(name))
            .map(|(_, v)| v.clone()),
        _ => None,
    }
}

fn index_value(base: &Value, index: &Value) -> Option<Value> {
    let i = match index {
        Value::Int(i) => *i,
        _ => return None,
    };
    match base {
        Value::Seq(items) => {
            let i = wrap_index(i, items.len())?;
            items.get(i).cloned()
        }
        Value::String(s) => {
            let count = s.chars().count();
            let i = wrap_index(i, count)?;
            s.chars().nth(i).map(|c| Value::String(c.to_string()))
        }
        Value::Bytes(b) => {
            let i = wrap_index(i, b.len())?;
            b.get(i).map(|&byte| Value::Int(byte as i64))
        }
        _ => None,
    }
}

fn wrap_index(i: i64, len: usize) -> Option<usize> {
    let i = if i < 0 { i + len as i64 } else { i };
    (0..len as i64).contains(&i).then_some(i as usize)
}

fn binary(op: BinaryOp, l: &Value, r: &Value, offset: usize) -> ExprResult<Value> {
    let result = match op {
        BinaryOp::Eq => equals(l, r),
        BinaryOp::Ne => !equals(l, r),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(l, r).ok_or_else(|| {
                ExprError::new(
                    format!("cannot compare {} with {}", l.kind(), r.kind()),
                    offset,
                    1,
                )
            })?;
            match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }
        }
        BinaryOp::StartsWith | BinaryOp::EndsWith => {
            let (l, r) = both_strings(l, r, op, offset)?;
            if op == BinaryOp::StartsWith {
                l.starts_with(&r)
            } else {
                l.ends_with(&r)
            }
        }
        BinaryOp::Contains => match l {
            Value::Seq(items) => items.iter().any(|item| equals(item, r)),
            _ => {
                let (l, r) = both_strings(l, r, op, offset)?;
                l.contains(&r)
            }
        },
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited above"),
    };
    Ok(Value::Bool(result))
}

fn both_strings(
    l: &Value,
    r: &Value,
    op: BinaryOp,
    offset: usize,
) -> ExprResult<(String, String)> {
    match (l, r) {
        (Value::String(a), Value::String(b)) => Ok((a.clone(), b.clone())),
        _ => Err(ExprError::new(
            format!("{op:?} requires strings, found {} and {}", l.kind(), r.kind()),
            offset,
            1,
        )),
    }
}

/// Equality with numeric unification: `1 == 1.0`.
fn equals(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => l == r,
    }
}

/// Ordering for comparable kinds: numbers, strings, timestamps.
fn compare(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
