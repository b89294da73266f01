use thiserror::Error;

use crate::scanner::token::{Position, Token};

use super::{
    grammar::{Grammar, ProductionId, Symbol},
    lr::LRState,
    lr_table::{LRAction, LRTables},
};

/// Callbacks the driver invokes while parsing. Values are opaque to the
/// driver; it only moves them between the parse stack and these hooks.
pub trait SemanticActions {
    type Value;
    type Output;
    type Error: std::error::Error + 'static;

    /// Value pushed for a shifted token.
    fn shift(&mut self, token: Token) -> Self::Value;

    /// Called once per reduction with the values of the popped right-hand side,
    /// leftmost first.
    fn reduce(
        &mut self,
        production: ProductionId,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, Self::Error>;

    /// Called on accept with the value on top of the stack. No further tokens
    /// will be read.
    fn accept(&mut self, value: Option<Self::Value>) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Error)]
pub enum ParseError<E: std::error::Error + 'static> {
    #[error("lexical error at {position}: {message}")]
    Lexical { message: String, position: Position },
    #[error("syntax error at {position}: unexpected {category} `{lexeme}` in state {state}")]
    UnexpectedToken {
        category: String,
        lexeme: String,
        position: Position,
        state: LRState,
    },
    #[error("token stream ended before end of input")]
    UnterminatedStream,
    #[error("no goto from state {state} on `{symbol}`")]
    BadGoto { state: LRState, symbol: String },
    #[error("parse stack underflow")]
    StackUnderflow,
    #[error("semantic action failed")]
    Action(#[source] E),
}

enum LRStackEntry<V> {
    Sentinel,
    State {
        symbol: Symbol,
        state: LRState,
        value: Option<V>,
    },
}

/// Table-driven shift-reduce parser. Holds only borrowed, read-only tables, so
/// one parser can run any number of parses.
pub struct Parser<'a> {
    grammar: &'a Grammar,
    tables: &'a LRTables,
}

impl<'a> Parser<'a> {
    pub fn new(grammar: &'a Grammar, tables: &'a LRTables) -> Parser<'a> {
        Parser { grammar, tables }
    }

    pub fn parse<I, A>(&self, tokens: I, actions: &mut A) -> Result<A::Output, ParseError<A::Error>>
    where
        I: IntoIterator<Item = Token>,
        A: SemanticActions,
    {
        let mut tokens = tokens.into_iter();
        let mut stack: Vec<LRStackEntry<A::Value>> = vec![
            LRStackEntry::Sentinel,
            LRStackEntry::State {
                symbol: self.grammar.start(),
                state: 0,
                value: None,
            },
        ];
        let mut lookahead = tokens.next().ok_or(ParseError::UnterminatedStream)?;

        loop {
            if lookahead.category.is_error() {
                return Err(ParseError::Lexical {
                    message: lookahead.lexeme,
                    position: lookahead.position,
                });
            }

            let state = top_state(&stack)?;
            match self.tables.action(state, lookahead.category) {
                LRAction::Shift(next) => {
                    log::trace!(
                        "state {}: shift `{}` -> {}",
                        state,
                        self.grammar.symbol_name(lookahead.category),
                        next
                    );
                    let symbol = lookahead.category;
                    let value = actions.shift(lookahead);
                    stack.push(LRStackEntry::State {
                        symbol,
                        state: next,
                        value: Some(value),
                    });
                    lookahead = tokens.next().ok_or(ParseError::UnterminatedStream)?;
                }
                LRAction::Reduce(production_id) => {
                    let production = self.grammar.production(production_id);
                    log::trace!(
                        "state {}: reduce {}",
                        state,
                        self.grammar.format_production(production_id)
                    );

                    let len = production.len();
                    if len >= stack.len() {
                        return Err(ParseError::StackUnderflow);
                    }
                    let split = stack.len() - len;
                    let mut values = Vec::with_capacity(len);
                    for (entry, expected) in stack.drain(split..).zip(production.body()) {
                        match entry {
                            LRStackEntry::State { symbol, value: Some(value), .. } => {
                                debug_assert_eq!(symbol, *expected);
                                values.push(value);
                            }
                            _ => return Err(ParseError::StackUnderflow),
                        }
                    }

                    let value = actions
                        .reduce(production_id, values)
                        .map_err(ParseError::Action)?;

                    let exposed = top_state(&stack)?;
                    let lhs = production.lhs();
                    let target = self.tables.goto(exposed, lhs).ok_or_else(|| ParseError::BadGoto {
                        state: exposed,
                        symbol: self.grammar.symbol_name(lhs),
                    })?;
                    stack.push(LRStackEntry::State {
                        symbol: lhs,
                        state: target,
                        value: Some(value),
                    });
                }
                LRAction::Accept if lookahead.category.is_eof() => {
                    log::trace!("state {}: accept", state);
                    let value = match stack.pop() {
                        Some(LRStackEntry::State { value, .. }) => value,
                        _ => None,
                    };
                    return actions.accept(value).map_err(ParseError::Action);
                }
                LRAction::Accept | LRAction::Invalid => {
                    return Err(ParseError::UnexpectedToken {
                        category: self.grammar.symbol_name(lookahead.category),
                        lexeme: lookahead.lexeme,
                        position: lookahead.position,
                        state,
                    });
                }
            }
        }
    }
}

fn top_state<V, E: std::error::Error + 'static>(stack: &[LRStackEntry<V>]) -> Result<LRState, ParseError<E>> {
    match stack.last() {
        Some(LRStackEntry::State { state, .. }) => Ok(*state),
        _ => Err(ParseError::StackUnderflow),
    }
}
