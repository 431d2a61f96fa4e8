use std::fmt;

use crate::value::Value;

/// Location of a token in its source text. Lines and columns start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset from the start of input.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset {} (line {}, column {})",
            self.offset, self.line, self.column
        )
    }
}

/// A significant token: structural punctuation or one lexical scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Colon,
    Comma,
    /// Accepted as a pair separator inside objects.
    Semicolon,
    /// String, number, boolean or null literal.
    Scalar(Value),
    /// End of input.
    End,
}

impl Token {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::LeftBrace => "'{'",
            Token::RightBrace => "'}'",
            Token::LeftBracket => "'['",
            Token::RightBracket => "']'",
            Token::Colon => "':'",
            Token::Comma => "','",
            Token::Semicolon => "';'",
            Token::Scalar(_) => "a value",
            Token::End => "end of input",
        }
    }
}
