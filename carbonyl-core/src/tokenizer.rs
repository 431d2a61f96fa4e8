//! Token sources consumed by the object parser.
//!
//! The parser only depends on the [`Tokenizer`] trait. [`TextTokenizer`] is the
//! stock implementation over a string slice.

use std::str::FromStr;

use num_bigint::BigInt;
use rust_decimal::Decimal;

use crate::error::Error;
use crate::token::{Position, Token};
use crate::value::Value;

/// A pre-lexed token stream with one token of push-back.
pub trait Tokenizer {
    /// Returns the next significant token, skipping insignificant whitespace.
    fn next_token(&mut self) -> Result<Token, Error>;

    /// Pushes the most recently returned token back onto the stream.
    ///
    /// Only one step of push-back is supported.
    fn back(&mut self) -> Result<(), Error>;

    /// Current position, used to locate syntax errors.
    fn position(&self) -> Position;

    /// Builds a syntax error at the current position.
    fn syntax_error(&self, message: &str) -> Error {
        Error::Syntax {
            message: message.to_string(),
            position: self.position(),
        }
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &mut T {
    fn next_token(&mut self) -> Result<Token, Error> {
        (**self).next_token()
    }

    fn back(&mut self) -> Result<(), Error> {
        (**self).back()
    }

    fn position(&self) -> Position {
        (**self).position()
    }
}

/// Characters that terminate an unquoted literal.
const DELIMITERS: &str = ",:]}/\\\"'[{;=#";

/// Tokenizer over JSON text.
///
/// Besides standard JSON it accepts single-quoted strings and `;` as an
/// object pair separator.
pub struct TextTokenizer<'a> {
    input: &'a str,
    pos: Position,
    last: Option<(Token, Position)>,
    pushed_back: bool,
}

impl<'a> TextTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        TextTokenizer {
            input,
            pos: Position::default(),
            last: None,
            pushed_back: false,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos.offset..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos.offset += c.len_utf8();
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t' | '\n' | '\r')) {
            self.next_char();
        }
    }

    fn error_here(&self, message: impl Into<String>) -> Error {
        Error::Syntax {
            message: message.into(),
            position: self.pos,
        }
    }

    fn lex(&mut self) -> Result<Token, Error> {
        let Some(c) = self.peek_char() else {
            return Ok(Token::End);
        };

        let punctuation = match c {
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            _ => None,
        };
        if let Some(token) = punctuation {
            self.next_char();
            return Ok(token);
        }

        match c {
            '"' | '\'' => {
                self.next_char();
                Ok(Token::Scalar(Value::String(self.lex_string(c)?)))
            }
            _ => self.lex_bare(),
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<String, Error> {
        let mut text = String::new();
        loop {
            match self.next_char() {
                None => return Err(self.error_here("Unterminated string")),
                Some(c) if c == quote => return Ok(text),
                Some('\\') => text.push(self.lex_escape()?),
                Some('\u{0000}'..='\u{001F}') => {
                    return Err(self.error_here("Unescaped control character in string"));
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn lex_escape(&mut self) -> Result<char, Error> {
        let escaped = match self.next_char() {
            Some('b') => '\u{0008}',
            Some('t') => '\t',
            Some('n') => '\n',
            Some('f') => '\u{000C}',
            Some('r') => '\r',
            Some(c @ ('"' | '\'' | '\\' | '/')) => c,
            Some('u') => return self.lex_unicode_escape(),
            Some(_) => return Err(self.error_here("Illegal escape")),
            None => return Err(self.error_here("Unterminated string")),
        };
        Ok(escaped)
    }

    fn lex_unicode_escape(&mut self) -> Result<char, Error> {
        let high = self.read_hex4()?;
        let code = match high {
            0xD800..=0xDBFF => {
                if self.next_char() != Some('\\') || self.next_char() != Some('u') {
                    return Err(self.error_here("Unpaired surrogate in string"));
                }
                let low = self.read_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(self.error_here("Unpaired surrogate in string"));
                }
                0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
            }
            0xDC00..=0xDFFF => return Err(self.error_here("Unpaired surrogate in string")),
            _ => high,
        };
        char::from_u32(code).ok_or_else(|| self.error_here("Illegal escape"))
    }

    fn read_hex4(&mut self) -> Result<u32, Error> {
        let mut code = 0;
        for _ in 0..4 {
            let digit = self
                .next_char()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error_here("Illegal escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn lex_bare(&mut self) -> Result<Token, Error> {
        let start = self.pos.offset;
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || DELIMITERS.contains(c) {
                break;
            }
            self.next_char();
        }
        let text = &self.input[start..self.pos.offset];

        match text {
            "" => Err(self.error_here("Missing value")),
            "true" => Ok(Token::Scalar(Value::Bool(true))),
            "false" => Ok(Token::Scalar(Value::Bool(false))),
            "null" => Ok(Token::Scalar(Value::Null)),
            _ => parse_number(text)
                .map(Token::Scalar)
                .ok_or_else(|| self.error_here(format!("Unexpected literal \"{text}\""))),
        }
    }
}

impl Tokenizer for TextTokenizer<'_> {
    fn next_token(&mut self) -> Result<Token, Error> {
        if self.pushed_back {
            if let Some((token, _)) = &self.last {
                self.pushed_back = false;
                return Ok(token.clone());
            }
        }

        self.skip_whitespace();
        let start = self.pos;
        let token = self.lex()?;
        self.last = Some((token.clone(), start));
        Ok(token)
    }

    fn back(&mut self) -> Result<(), Error> {
        if self.pushed_back || self.last.is_none() {
            return Err(self.syntax_error("Stepping back two steps is not supported"));
        }
        self.pushed_back = true;
        Ok(())
    }

    fn position(&self) -> Position {
        match &self.last {
            Some((_, start)) if self.pushed_back => *start,
            _ => self.pos,
        }
    }
}

/// Converts a JSON number literal to the narrowest fitting [`Value`].
///
/// Integers become `Int`, or `BigInt` past the `i64` range. Literals with a
/// fraction or exponent become `Float`, or `Decimal` when `f64` overflows.
/// `-0` stays a float so the sign survives.
pub fn parse_number(text: &str) -> Option<Value> {
    if !is_number_literal(text) {
        return None;
    }

    if !text.contains(['.', 'e', 'E']) {
        if text == "-0" {
            return Some(Value::Float(-0.0));
        }
        return text
            .parse::<i64>()
            .ok()
            .map(Value::Int)
            .or_else(|| BigInt::from_str(text).ok().map(Value::BigInt));
    }

    let float: f64 = text.parse().ok()?;
    if float.is_finite() {
        return Some(Value::Float(float));
    }
    let decimal = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };
    decimal.ok().map(Value::Decimal)
}

fn is_number_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    let digits = |i: &mut usize| {
        let start = *i;
        while bytes.get(*i).is_some_and(u8::is_ascii_digit) {
            *i += 1;
        }
        *i - start
    };

    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let int_start = i;
    let int_len = digits(&mut i);
    if int_len == 0 || (bytes[int_start] == b'0' && int_len > 1) {
        return false;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        if digits(&mut i) == 0 {
            return false;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        if digits(&mut i) == 0 {
            return false;
        }
    }
    i == bytes.len()
}
