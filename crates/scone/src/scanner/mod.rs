use std::{
    sync::mpsc::{self, Receiver},
    thread,
};

use self::{
    lexeme_sets::scone_lexemes::SconeLexemes,
    lexemes::LexemeSet,
    token::{Position, Token},
};

pub mod lexeme_sets;
pub mod lexemes;
pub mod token;

// Hand written maximal munch scanner:
//   num     ::= [0-9]+            (a digit run running into a letter is an error)
//   ident   ::= [A-Za-z_][A-Za-z0-9_]*   (keywords are carved out of identifiers)
//   trivia  ::= whitespace | '//' up to end of line
// Two character operators win over their one character prefixes.
pub struct Scanner<'a> {
    source: &'a str,
    offset: usize,
    line: u32,
    column: u32,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner {
            source,
            offset: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.offset..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    fn current_position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => self.bump_while(|c| c != '\n'),
                _ => return,
            }
        }
    }

    // errors end the token stream, the driver stops at the first one anyway
    fn error(&mut self, message: String, position: Position) -> Token {
        self.finished = true;
        Token::error(message).at(position)
    }

    fn scan_token(&mut self) -> Token {
        self.skip_trivia();
        let position = self.current_position();
        let start = self.offset;

        let Some(c) = self.bump() else {
            self.finished = true;
            return Token::eof().at(position);
        };

        let lexeme = if c.is_ascii_digit() {
            self.bump_while(|c| c.is_ascii_digit());
            if self.peek().is_some_and(is_identifier_char) {
                self.bump_while(is_identifier_char);
                let text = &self.source[start..self.offset];
                return self.error(format!("bad number syntax: `{}`", text), position);
            }
            SconeLexemes::Number
        } else if c.is_ascii_alphabetic() || c == '_' {
            self.bump_while(is_identifier_char);
            SconeLexemes::keyword(&self.source[start..self.offset]).unwrap_or(SconeLexemes::Identifier)
        } else {
            let followed_by_equals = self.peek() == Some('=');
            let lexeme = match c {
                '+' => SconeLexemes::Plus,
                '-' => SconeLexemes::Minus,
                '*' => SconeLexemes::Star,
                '/' => SconeLexemes::Slash,
                '%' => SconeLexemes::Percent,
                '(' => SconeLexemes::LeftParen,
                ')' => SconeLexemes::RightParen,
                ';' => SconeLexemes::Semicolon,
                ',' => SconeLexemes::Comma,
                '{' => SconeLexemes::LeftBrace,
                '}' => SconeLexemes::RightBrace,
                '&' => SconeLexemes::And,
                '|' => SconeLexemes::Or,
                '=' if followed_by_equals => SconeLexemes::Equal,
                '=' => SconeLexemes::Assign,
                '!' if followed_by_equals => SconeLexemes::NotEqual,
                '!' => SconeLexemes::Not,
                '<' if followed_by_equals => SconeLexemes::LessEqual,
                '<' => SconeLexemes::Less,
                '>' if followed_by_equals => SconeLexemes::GreaterEqual,
                '>' => SconeLexemes::Greater,
                other => return self.error(format!("unexpected character `{}`", other), position),
            };
            if matches!(
                lexeme,
                SconeLexemes::Equal | SconeLexemes::NotEqual | SconeLexemes::LessEqual | SconeLexemes::GreaterEqual
            ) {
                self.bump();
            }
            lexeme
        };

        Token::new(lexeme.symbol(), &self.source[start..self.offset]).at(position)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        Some(self.scan_token())
    }
}

/// Tokens produced by a scanner running on its own thread. The channel has no
/// buffer, so the scanner only runs ahead of the parser by the token being
/// handed over.
pub struct TokenStream {
    receiver: Receiver<Token>,
}

/// Starts scanning `source` on a new thread. Dropping the stream stops the
/// scanner at its next hand-off.
pub fn spawn(source: String) -> TokenStream {
    let (sender, receiver) = mpsc::sync_channel(0);
    thread::spawn(move || {
        for token in Scanner::new(&source) {
            if sender.send(token).is_err() {
                log::trace!("token stream dropped, scanner stopping");
                return;
            }
        }
    });
    TokenStream { receiver }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::grammar::Symbol;

    fn categories(source: &str) -> Vec<Symbol> {
        Scanner::new(source).map(|token| token.category).collect()
    }

    #[test]
    fn scans_statement() {
        let tokens: Vec<Token> = Scanner::new("int x1 = 42 <= y;").collect();
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["int", "x1", "=", "42", "<=", "y", ";", ""]);
        assert_eq!(
            tokens.iter().map(|t| t.category).collect::<Vec<_>>(),
            vec![
                SconeLexemes::Int.symbol(),
                SconeLexemes::Identifier.symbol(),
                SconeLexemes::Assign.symbol(),
                SconeLexemes::Number.symbol(),
                SconeLexemes::LessEqual.symbol(),
                SconeLexemes::Identifier.symbol(),
                SconeLexemes::Semicolon.symbol(),
                Symbol::EOF,
            ]
        );
    }

    #[test]
    fn tracks_positions_and_skips_comments() {
        let tokens: Vec<Token> = Scanner::new("a // note\n  !=b").collect();
        assert_eq!(tokens[0].position, Position { line: 1, column: 1 });
        assert_eq!(tokens[1].category, SconeLexemes::NotEqual.symbol());
        assert_eq!(tokens[1].position, Position { line: 2, column: 3 });
        assert_eq!(tokens[2].position, Position { line: 2, column: 5 });
        assert!(tokens[3].category.is_eof());
    }

    #[test]
    fn errors_end_the_stream() {
        let tokens: Vec<Token> = Scanner::new("x = 12ab;").collect();
        assert_eq!(tokens.len(), 3);
        assert!(tokens[2].category.is_error());
        assert_eq!(tokens[2].lexeme, "bad number syntax: `12ab`");

        assert_eq!(categories("x # y"), vec![SconeLexemes::Identifier.symbol(), Symbol::ERROR]);
    }

    #[test]
    fn threaded_stream_matches_scanner() {
        let source = "func f(int a) int { return a * 2; }";
        let direct: Vec<Token> = Scanner::new(source).collect();
        let threaded: Vec<Token> = spawn(source.to_string()).collect();
        assert_eq!(direct, threaded);
    }

    #[test]
    fn dropping_stream_stops_scanner() {
        let mut stream = spawn("a b c d e f".to_string());
        assert_eq!(stream.next().map(|t| t.lexeme), Some("a".to_string()));
        drop(stream);
    }
}
