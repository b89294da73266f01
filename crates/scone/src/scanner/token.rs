use std::fmt::Display;

use crate::parser::grammar::Symbol;

/// 1-based location of the first character of a lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub category: Symbol,
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn new(category: Symbol, lexeme: impl Into<String>) -> Token {
        Token {
            category,
            lexeme: lexeme.into(),
            position: Position::default(),
        }
    }

    pub fn eof() -> Token {
        Token::new(Symbol::EOF, "")
    }

    /// Error tokens carry the scanner's message in place of a lexeme.
    pub fn error(message: impl Into<String>) -> Token {
        Token::new(Symbol::ERROR, message)
    }

    pub fn at(mut self, position: Position) -> Token {
        self.position = position;
        self
    }
}
