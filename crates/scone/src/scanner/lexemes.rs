use crate::parser::grammar::Symbol;

// Expected usage: implement this trait for an enum whose variants encode all tokens
// one expects to see given a language's microsyntax

// 3 representations for each token: enum variant, string name, and numeric id.
// The numeric id doubles as the terminal number inside a grammar, so ids must be
// dense and start at 0
pub trait LexemeSet: Clone + Copy + 'static {
    fn from_id(id: u32) -> Option<Self>;
    fn to_id(self) -> u32;
    fn to_name(self) -> &'static str;
    fn size() -> u32;

    fn iter() -> LexemeIterator<Self> {
        LexemeIterator { next: 0, _type: Default::default() }
    }

    fn symbol(self) -> Symbol {
        Symbol::terminal(self.to_id() as usize)
    }

    fn from_symbol(symbol: Symbol) -> Option<Self> {
        symbol
            .terminal_index()
            .and_then(|index| Self::from_id(index as u32))
    }
}

pub struct LexemeIterator<T: LexemeSet> {
    next: u32,
    _type: std::marker::PhantomData<T>,
}

impl<T: LexemeSet> Iterator for LexemeIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= T::size() {
            return None;
        }
        let lexeme = T::from_id(self.next);
        self.next += 1;
        lexeme
    }
}
