//! Reader for Python literal syntax.
//!
//! Chatbot loggers frequently store a conversation as `str(messages)`, which
//! produces `[{'role': 'user', 'content': "it's"}]` rather than JSON. This
//! module turns that subset of Python (strings, numbers, `True`/`False`/`None`,
//! lists, tuples and dicts) into a [`serde_json::Value`].

use serde_json::{Map, Number, Value};
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for LiteralError {}

type Result<T> = std::result::Result<T, LiteralError>;

/// Nesting limit; deeper input is rejected rather than recursed into.
const MAX_DEPTH: usize = 128;

pub fn parse(input: &str) -> Result<Value> {
    let mut parser = Parser {
        src: input,
        chars: input.char_indices().peekable(),
        depth: 0,
    };
    parser.skip_ws();
    let value = parser.parse_value()?;
    parser.skip_ws();
    if let Some(&(offset, c)) = parser.chars.peek() {
        return Err(LiteralError {
            offset,
            message: format!("unexpected trailing character {c:?}"),
        });
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl Parser<'_> {
    fn offset(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn error<T>(&mut self, message: impl Into<String>) -> Result<T> {
        Err(LiteralError {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == want => {
                self.chars.next();
                Ok(())
            }
            Some(c) => self.error(format!("expected {want:?}, found {c:?}")),
            None => self.error(format!("expected {want:?}, found end of input")),
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.peek() {
            Some('[') => self.parse_sequence('[', ']'),
            Some('(') => self.parse_sequence('(', ')'),
            Some('{') => self.parse_dict(),
            Some('\'' | '"') => self.parse_string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_word(),
            Some(c) => self.error(format!("unexpected character {c:?}")),
            None => self.error("unexpected end of input"),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return self.error("nesting too deep");
        }
        Ok(())
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Result<Value> {
        self.enter()?;
        self.expect(open)?;
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.chars.next();
                break;
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.chars.next();
                    saw_comma = true;
                }
                Some(c) if c == close => {
                    self.chars.next();
                    break;
                }
                Some(c) => return self.error(format!("expected ',' or {close:?}, found {c:?}")),
                None => return self.error(format!("unterminated sequence, expected {close:?}")),
            }
        }
        self.depth -= 1;
        // `(x)` is just x; only `(x,)` makes a one-item tuple.
        if open == '(' && items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    fn parse_dict(&mut self) -> Result<Value> {
        self.enter()?;
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.chars.next();
                break;
            }
            let key = match self.parse_value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.chars.next();
                }
                Some('}') => {
                    self.chars.next();
                    break;
                }
                Some(c) => return self.error(format!("expected ',' or '}}', found {c:?}")),
                None => return self.error("unterminated dict, expected '}'"),
            }
        }
        self.depth -= 1;
        Ok(Value::Object(map))
    }

    fn parse_word(&mut self) -> Result<Value> {
        let start = self.offset();
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            // String prefixes: u'...', r'...'
            "u" | "U" if matches!(self.peek(), Some('\'' | '"')) => {
                self.parse_string().map(Value::String)
            }
            "r" | "R" if matches!(self.peek(), Some('\'' | '"')) => {
                self.parse_raw_string().map(Value::String)
            }
            _ => Err(LiteralError {
                offset: start,
                message: format!("unknown name {word:?}"),
            }),
        }
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.offset();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_') {
                if c != '_' {
                    text.push(c);
                }
                self.chars.next();
            } else {
                break;
            }
        }
        let text = text.strip_prefix('+').unwrap_or(&text);
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                offset: start,
                message: format!("invalid number {text:?}"),
            })
    }

    fn open_quote(&mut self) -> Result<char> {
        match self.peek() {
            Some(q @ ('\'' | '"')) => {
                self.chars.next();
                Ok(q)
            }
            _ => self.error("expected string"),
        }
    }

    fn parse_raw_string(&mut self) -> Result<String> {
        let quote = self.open_quote()?;
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(out),
                Some((_, '\\')) => {
                    out.push('\\');
                    if let Some((_, next)) = self.chars.next() {
                        out.push(next);
                    }
                }
                Some((_, c)) => out.push(c),
                None => return self.error("unterminated string"),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self.open_quote()?;
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(out),
                Some((_, '\\')) => self.parse_escape(&mut out)?,
                Some((_, c)) => out.push(c),
                None => return self.error("unterminated string"),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<()> {
        let Some((_, c)) = self.chars.next() else {
            return self.error("unterminated escape");
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '\\' | '\'' | '"' => out.push(c),
            // Escaped newline is a line continuation
            '\n' => {}
            'x' => out.push(self.parse_hex_escape(2)?),
            'u' => out.push(self.parse_hex_escape(4)?),
            'U' => out.push(self.parse_hex_escape(8)?),
            other => {
                // Python keeps unknown escapes verbatim
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let Some(d) = self.peek().and_then(|c| c.to_digit(16)) else {
                return self.error("invalid hex escape");
            };
            self.chars.next();
            code = code * 16 + d;
        }
        match char::from_u32(code) {
            Some(c) => Ok(c),
            None => self.error(format!("invalid code point {code:#x}")),
        }
    }
}
