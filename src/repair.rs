//! Best-effort repair of semi-structured textual encodings.
//!
//! Catalog rows embed nested objects as loosely formatted text —
//! `key=value, key2=value2`, single-quoted object literals, sometimes plain
//! JSON. [`repair`] turns any of these into a [`serde_json::Value`] through
//! an explicit lenient grammar instead of a rewrite-then-parse pass, so the
//! failure modes are enumerable:
//!
//! - strict JSON objects and arrays pass through unchanged, which makes
//!   repair idempotent on well-formed input;
//! - otherwise the input is parsed as comma-separated `key=value` /
//!   `key: value` pairs with optional `{}` wrapping, bare or quoted keys,
//!   and values that are quoted strings, nested objects/lists, or bare
//!   tokens delimited by the next `,`, `}` or `]`;
//! - anything else degrades to an empty object with a warning. Repair never
//!   returns an error.
//!
//! Values read through the key=value grammar keep string typing (`"50"`),
//! matching the convention of the encoding; the load boundary coerces.

use serde_json::{Map, Value};
use tracing::warn;

/// Parse a semi-structured string into a JSON value, degrading to an empty
/// object on any failure.
pub fn repair(input: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(input) {
        if value.is_object() || value.is_array() {
            return value;
        }
    }

    let mut parser = Lenient::new(input);
    match parser.parse_document() {
        Some(value) => value,
        None => {
            warn!(raw = %input, "could not repair structured string, substituting empty object");
            Value::Object(Map::new())
        }
    }
}

/// Recursive-descent parser for the lenient grammar.
struct Lenient {
    chars: Vec<char>,
    pos: usize,
}

impl Lenient {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    /// Top level: a list (`[...]`) or an object with optional braces.
    /// The whole input must be consumed.
    fn parse_document(&mut self) -> Option<Value> {
        self.skip_ws();
        let value = match self.peek()? {
            '[' => self.parse_list()?,
            '{' => self.parse_object(true)?,
            _ => self.parse_object(false)?,
        };
        self.skip_ws();
        if self.pos == self.chars.len() {
            Some(value)
        } else {
            None
        }
    }

    fn parse_object(&mut self, braced: bool) -> Option<Value> {
        if braced {
            self.expect('{')?;
        }

        let mut map = Map::new();
        self.skip_ws();
        if braced && self.peek() == Some('}') {
            self.pos += 1;
            return Some(Value::Object(map));
        }

        loop {
            let key = self.parse_key()?;
            self.skip_ws();
            match self.peek() {
                Some('=') | Some(':') => self.pos += 1,
                _ => return None,
            }
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    self.skip_ws();
                }
                Some('}') if braced => {
                    self.pos += 1;
                    return Some(Value::Object(map));
                }
                None if !braced => return Some(Value::Object(map)),
                _ => return None,
            }
        }
    }

    fn parse_list(&mut self) -> Option<Value> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Some(Value::Array(items));
        }

        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Some(Value::Array(items));
                }
                _ => return None,
            }
        }
    }

    fn parse_key(&mut self) -> Option<String> {
        self.skip_ws();
        match self.peek()? {
            '\'' | '"' => self.parse_quoted(),
            c if c.is_alphanumeric() || c == '_' => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Some(self.chars[start..self.pos].iter().collect())
            }
            _ => None,
        }
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '{' => self.parse_object(true),
            '[' => self.parse_list(),
            '\'' | '"' => self.parse_quoted().map(Value::String),
            _ => self.parse_bare_token(),
        }
    }

    /// A quoted string, single or double, with backslash escapes taken
    /// literally.
    fn parse_quoted(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            if c == '\\' {
                out.push(self.peek()?);
                self.pos += 1;
            } else if c == quote {
                return Some(out);
            } else {
                out.push(c);
            }
        }
    }

    /// An unquoted scalar: everything up to the next `,`, `}` or `]`,
    /// trimmed, kept as a string per the key=value convention. Must be
    /// non-empty.
    fn parse_bare_token(&mut self) -> Option<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ',' || c == '}' || c == ']' {
                break;
            }
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Value::String(trimmed.to_string()))
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, c: char) -> Option<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}
