use crate::scanner::lexemes::LexemeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SconeLexemes {
    Number,
    Identifier,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LeftParen,
    RightParen,
    Semicolon,
    Comma,
    LeftBrace,
    RightBrace,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Not,
    Int,
    Bool,
    Void,
    Func,
    If,
    Else,
    Return,
    True,
    False,
}

impl SconeLexemes {
    pub const ALL: [SconeLexemes; 32] = [
        SconeLexemes::Number,
        SconeLexemes::Identifier,
        SconeLexemes::Plus,
        SconeLexemes::Minus,
        SconeLexemes::Star,
        SconeLexemes::Slash,
        SconeLexemes::Percent,
        SconeLexemes::LeftParen,
        SconeLexemes::RightParen,
        SconeLexemes::Semicolon,
        SconeLexemes::Comma,
        SconeLexemes::LeftBrace,
        SconeLexemes::RightBrace,
        SconeLexemes::Assign,
        SconeLexemes::Equal,
        SconeLexemes::NotEqual,
        SconeLexemes::Less,
        SconeLexemes::LessEqual,
        SconeLexemes::Greater,
        SconeLexemes::GreaterEqual,
        SconeLexemes::And,
        SconeLexemes::Or,
        SconeLexemes::Not,
        SconeLexemes::Int,
        SconeLexemes::Bool,
        SconeLexemes::Void,
        SconeLexemes::Func,
        SconeLexemes::If,
        SconeLexemes::Else,
        SconeLexemes::Return,
        SconeLexemes::True,
        SconeLexemes::False,
    ];

    pub fn keyword(word: &str) -> Option<SconeLexemes> {
        let keyword = match word {
            "int" => SconeLexemes::Int,
            "bool" => SconeLexemes::Bool,
            "void" => SconeLexemes::Void,
            "func" => SconeLexemes::Func,
            "if" => SconeLexemes::If,
            "else" => SconeLexemes::Else,
            "return" => SconeLexemes::Return,
            "true" => SconeLexemes::True,
            "false" => SconeLexemes::False,
            _ => return None,
        };
        Some(keyword)
    }
}

impl LexemeSet for SconeLexemes {
    fn from_id(id: u32) -> Option<Self> {
        SconeLexemes::ALL.get(id as usize).copied()
    }

    fn to_id(self) -> u32 {
        self as u32
    }

    fn to_name(self) -> &'static str {
        match self {
            SconeLexemes::Number => "num",
            SconeLexemes::Identifier => "ident",
            SconeLexemes::Plus => "+",
            SconeLexemes::Minus => "-",
            SconeLexemes::Star => "*",
            SconeLexemes::Slash => "/",
            SconeLexemes::Percent => "%",
            SconeLexemes::LeftParen => "(",
            SconeLexemes::RightParen => ")",
            SconeLexemes::Semicolon => ";",
            SconeLexemes::Comma => ",",
            SconeLexemes::LeftBrace => "{",
            SconeLexemes::RightBrace => "}",
            SconeLexemes::Assign => "=",
            SconeLexemes::Equal => "==",
            SconeLexemes::NotEqual => "!=",
            SconeLexemes::Less => "<",
            SconeLexemes::LessEqual => "<=",
            SconeLexemes::Greater => ">",
            SconeLexemes::GreaterEqual => ">=",
            SconeLexemes::And => "&",
            SconeLexemes::Or => "|",
            SconeLexemes::Not => "!",
            SconeLexemes::Int => "int",
            SconeLexemes::Bool => "bool",
            SconeLexemes::Void => "void",
            SconeLexemes::Func => "func",
            SconeLexemes::If => "if",
            SconeLexemes::Else => "else",
            SconeLexemes::Return => "return",
            SconeLexemes::True => "true",
            SconeLexemes::False => "false",
        }
    }

    fn size() -> u32 {
        SconeLexemes::ALL.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense() {
        for (i, lexeme) in SconeLexemes::iter().enumerate() {
            assert_eq!(lexeme.to_id() as usize, i);
            assert_eq!(SconeLexemes::from_symbol(lexeme.symbol()), Some(lexeme));
        }
        assert_eq!(SconeLexemes::iter().count(), SconeLexemes::size() as usize);
        assert_eq!(SconeLexemes::keyword("return"), Some(SconeLexemes::Return));
        assert_eq!(SconeLexemes::keyword("echo"), None);
    }
}
