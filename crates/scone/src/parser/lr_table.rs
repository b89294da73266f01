use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    first::FirstSets,
    grammar::{Grammar, ProductionId, Symbol},
    lr::{CanonicalCollection, LRState},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LRAction {
    Invalid,
    Shift(LRState),
    Reduce(ProductionId),
    Accept,
}

impl Display for LRAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LRAction::Invalid => write!(f, "invalid"),
            LRAction::Shift(state) => write!(f, "shift {}", state),
            LRAction::Reduce(production) => write!(f, "reduce {}", production),
            LRAction::Accept => write!(f, "accept"),
        }
    }
}

/// What to do when two different actions land in the same action cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The action written last replaces the earlier one.
    #[default]
    Overwrite,
    /// Table construction fails on the first conflict.
    Reject,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TableOptions {
    pub conflict_policy: ConflictPolicy,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("conflict in state {state} on `{symbol}`: {existing} vs {incoming}")]
    Conflict {
        state: LRState,
        symbol: String,
        existing: LRAction,
        incoming: LRAction,
    },
    #[error("state {state} has an item shifting `{symbol}` but no transition on it")]
    MissingTransition { state: LRState, symbol: String },
}

/// Dense action and goto tables. Action rows have one column per terminal plus a
/// final column for end-of-input; goto rows have one column per nonterminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LRTables {
    n_states: usize,
    n_terminals: usize,
    n_nonterminals: usize,
    action: Vec<LRAction>,
    goto: Vec<Option<LRState>>,
}

impl LRTables {
    // Canonical LR(1) table construction
    pub fn from_grammar(
        grammar: &Grammar,
        first: &FirstSets,
        options: &TableOptions,
    ) -> Result<LRTables, TableError> {
        let collection = CanonicalCollection::build(grammar, first);
        LRTables::from_collection(grammar, &collection, options)
    }

    pub fn from_collection(
        grammar: &Grammar,
        collection: &CanonicalCollection,
        options: &TableOptions,
    ) -> Result<LRTables, TableError> {
        let n_states = collection.n_states();
        let n_terminals = grammar.n_terminals();
        let n_nonterminals = grammar.n_nonterminals();

        let mut tables = LRTables {
            n_states,
            n_terminals,
            n_nonterminals,
            action: vec![LRAction::Invalid; n_states * (n_terminals + 1)],
            goto: vec![None; n_states * n_nonterminals],
        };

        for (state, items) in collection.states() {
            for item in items.iter() {
                let production = grammar.production(item.production);
                match item.next_symbol(grammar) {
                    Some(symbol) if symbol.is_terminal() => {
                        let target = collection.transition(state, symbol).ok_or_else(|| {
                            TableError::MissingTransition {
                                state,
                                symbol: grammar.symbol_name(symbol),
                            }
                        })?;
                        tables.write_action(grammar, state, symbol, LRAction::Shift(target), options)?;
                    }
                    Some(_) => {}
                    None => {
                        let action = if production.lhs() == grammar.start() && item.lookahead.is_eof() {
                            LRAction::Accept
                        } else {
                            LRAction::Reduce(item.production)
                        };
                        tables.write_action(grammar, state, item.lookahead, action, options)?;
                    }
                }
            }
        }

        for (from, symbol, to) in collection.transitions() {
            if let Some(nt) = symbol.nonterminal_index() {
                tables.goto[from * n_nonterminals + nt] = Some(to);
            }
        }

        log::debug!(
            "built LR(1) tables: {} states, {} action columns, {} goto columns",
            n_states,
            n_terminals + 1,
            n_nonterminals
        );
        Ok(tables)
    }

    fn write_action(
        &mut self,
        grammar: &Grammar,
        state: LRState,
        lookahead: Symbol,
        action: LRAction,
        options: &TableOptions,
    ) -> Result<(), TableError> {
        let Some(column) = self.action_column(lookahead) else {
            // epsilon lookaheads have no column
            log::trace!(
                "state {}: dropping {} on `{}`",
                state,
                action,
                grammar.symbol_name(lookahead)
            );
            return Ok(());
        };

        let cell = &mut self.action[state * (self.n_terminals + 1) + column];
        if *cell != LRAction::Invalid && *cell != action {
            match options.conflict_policy {
                ConflictPolicy::Overwrite => log::trace!(
                    "state {}: {} on `{}` overwritten by {}",
                    state,
                    cell,
                    grammar.symbol_name(lookahead),
                    action
                ),
                ConflictPolicy::Reject => {
                    return Err(TableError::Conflict {
                        state,
                        symbol: grammar.symbol_name(lookahead),
                        existing: *cell,
                        incoming: action,
                    });
                }
            }
        }
        *cell = action;
        Ok(())
    }

    fn action_column(&self, symbol: Symbol) -> Option<usize> {
        if symbol.is_eof() {
            return Some(self.n_terminals);
        }
        symbol.terminal_index().filter(|&t| t < self.n_terminals)
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Action for `state` on lookahead `symbol`; `Invalid` for symbols that have
    /// no column and for states out of range.
    pub fn action(&self, state: LRState, symbol: Symbol) -> LRAction {
        match self.action_column(symbol) {
            Some(column) if state < self.n_states => {
                self.action[state * (self.n_terminals + 1) + column]
            }
            _ => LRAction::Invalid,
        }
    }

    pub fn goto(&self, state: LRState, nonterminal: Symbol) -> Option<LRState> {
        match nonterminal.nonterminal_index() {
            Some(nt) if nt < self.n_nonterminals && state < self.n_states => {
                self.goto[state * self.n_nonterminals + nt]
            }
            _ => None,
        }
    }

    /// Human readable dump, one state per line.
    pub fn display<'a>(&'a self, grammar: &'a Grammar) -> DisplayTables<'a> {
        DisplayTables { tables: self, grammar }
    }
}

pub struct DisplayTables<'a> {
    tables: &'a LRTables,
    grammar: &'a Grammar,
}

impl Display for DisplayTables<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns: Vec<Symbol> = self
            .grammar
            .terminals()
            .chain(std::iter::once(Symbol::EOF))
            .collect();

        for state in 0..self.tables.n_states {
            write!(f, "{:>4}:", state)?;
            for symbol in &columns {
                match self.tables.action(state, *symbol) {
                    LRAction::Invalid => {}
                    action => write!(f, " {}={}", self.grammar.symbol_name(*symbol), action)?,
                }
            }
            for nonterminal in self.grammar.nonterminals() {
                if let Some(target) = self.tables.goto(state, nonterminal) {
                    write!(f, " {}->{}", self.grammar.symbol_name(nonterminal), target)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
