use std::fmt::Display;

use scone_util::make_type_idx;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scanner::lexemes::LexemeSet;

const NONTERMINAL_BASE: u32 = 1000;
const SPECIAL_BASE: u32 = 10000;

/// Grammar symbol. The class of a symbol is decided purely by which range its
/// raw id falls in: terminals are `[0, 1000)`, nonterminals `[1000, 10000)`,
/// followed by the error, epsilon and end-of-input markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolClass {
    Terminal,
    Nonterminal,
    Epsilon,
    EndOfInput,
    Error,
}

impl Symbol {
    pub const ERROR: Symbol = Symbol(SPECIAL_BASE);
    pub const EPSILON: Symbol = Symbol(SPECIAL_BASE + 1);
    pub const EOF: Symbol = Symbol(SPECIAL_BASE + 2);

    pub const MAX_TERMINALS: usize = NONTERMINAL_BASE as usize;
    pub const MAX_NONTERMINALS: usize = (SPECIAL_BASE - NONTERMINAL_BASE) as usize;

    pub const fn terminal(index: usize) -> Symbol {
        assert!(index < Symbol::MAX_TERMINALS);
        Symbol(index as u32)
    }

    pub const fn nonterminal(index: usize) -> Symbol {
        assert!(index < Symbol::MAX_NONTERMINALS);
        Symbol(NONTERMINAL_BASE + index as u32)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn class(self) -> SymbolClass {
        match self.0 {
            x if x < NONTERMINAL_BASE => SymbolClass::Terminal,
            x if x < SPECIAL_BASE => SymbolClass::Nonterminal,
            x if x == Symbol::EPSILON.0 => SymbolClass::Epsilon,
            x if x == Symbol::EOF.0 => SymbolClass::EndOfInput,
            _ => SymbolClass::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.class() == SymbolClass::Terminal
    }

    pub fn is_nonterminal(self) -> bool {
        self.class() == SymbolClass::Nonterminal
    }

    pub fn is_epsilon(self) -> bool {
        self == Symbol::EPSILON
    }

    pub fn is_eof(self) -> bool {
        self == Symbol::EOF
    }

    pub fn is_error(self) -> bool {
        self.class() == SymbolClass::Error
    }

    /// Dense terminal number, which is also the action table column.
    pub fn terminal_index(self) -> Option<usize> {
        self.is_terminal().then_some(self.0 as usize)
    }

    /// Dense nonterminal number, which is also the goto table column.
    pub fn nonterminal_index(self) -> Option<usize> {
        self.is_nonterminal()
            .then(|| (self.0 - NONTERMINAL_BASE) as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    lhs: Symbol,
    // an empty alternative is stored as the single symbol epsilon
    rhs: Vec<Symbol>,
}

make_type_idx!(#[derive(Serialize, Deserialize)] pub ProductionId, Production);

impl Production {
    pub fn lhs(&self) -> Symbol {
        self.lhs
    }

    /// Right-hand side as written, `[EPSILON]` for an empty alternative.
    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    /// Right-hand side with the epsilon marker stripped; this is what the
    /// item engine moves the dot over.
    pub fn body(&self) -> &[Symbol] {
        if self.is_epsilon() {
            &[]
        } else {
            &self.rhs
        }
    }

    pub fn len(&self) -> usize {
        self.body().len()
    }

    pub fn is_epsilon(&self) -> bool {
        self.rhs == [Symbol::EPSILON]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("`{0}` cannot appear on the left-hand side of a production")]
    NotANonterminal(String),
    #[error("symbol {0} in production for `{1}` was never declared")]
    UndeclaredSymbol(u32, String),
    #[error("epsilon must be the only symbol of an alternative of `{0}`")]
    MisplacedEpsilon(String),
    #[error("`{lhs}` owns {expected} alternatives but {found} replacements were given")]
    MismatchedAlternatives {
        lhs: String,
        expected: usize,
        found: usize,
    },
    #[error("start symbol `{0}` has no productions")]
    NoStartProductions(String),
    #[error("too many terminals declared")]
    TooManyTerminals,
    #[error("too many nonterminals declared")]
    TooManyNonterminals,
    #[error("lexeme `{0}` does not map onto the next free terminal")]
    LexemeOutOfOrder(&'static str),
}

/// Accumulates symbols and productions. Lookups by left-hand side only exist on
/// the compiled [`Grammar`].
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    terminal_names: Vec<String>,
    nonterminal_names: Vec<String>,
    productions: Vec<Production>,
}

impl GrammarBuilder {
    pub fn new() -> GrammarBuilder {
        Default::default()
    }

    pub fn terminal(&mut self, name: impl Into<String>) -> Result<Symbol, GrammarError> {
        let index = self.terminal_names.len();
        if index >= Symbol::MAX_TERMINALS {
            return Err(GrammarError::TooManyTerminals);
        }
        self.terminal_names.push(name.into());
        Ok(Symbol::terminal(index))
    }

    /// Declares every lexeme of `T` as a terminal, in id order.
    pub fn declare_lexemes<T: LexemeSet>(&mut self) -> Result<(), GrammarError> {
        for lexeme in T::iter() {
            let symbol = self.terminal(lexeme.to_name())?;
            if symbol != lexeme.symbol() {
                return Err(GrammarError::LexemeOutOfOrder(lexeme.to_name()));
            }
        }
        Ok(())
    }

    pub fn nonterminal(&mut self, name: impl Into<String>) -> Result<Symbol, GrammarError> {
        let index = self.nonterminal_names.len();
        if index >= Symbol::MAX_NONTERMINALS {
            return Err(GrammarError::TooManyNonterminals);
        }
        self.nonterminal_names.push(name.into());
        Ok(Symbol::nonterminal(index))
    }

    /// Fresh nonterminal named after `base` with a prime appended.
    pub fn derived_nonterminal(&mut self, base: Symbol) -> Result<Symbol, GrammarError> {
        let name = match base.nonterminal_index() {
            Some(index) if index < self.nonterminal_names.len() => {
                format!("{}'", self.nonterminal_names[index])
            }
            _ => return Err(GrammarError::NotANonterminal(self.name_of(base))),
        };
        self.nonterminal(name)
    }

    pub fn add_production(
        &mut self,
        lhs: Symbol,
        rhs: Vec<Symbol>,
    ) -> Result<ProductionId, GrammarError> {
        let rhs = self.check_alternative(lhs, rhs)?;
        Ok(ProductionId::from_push(&mut self.productions, Production { lhs, rhs }))
    }

    pub fn add_productions<I>(&mut self, lhs: Symbol, alternatives: I) -> Result<Vec<ProductionId>, GrammarError>
    where
        I: IntoIterator<Item = Vec<Symbol>>,
    {
        alternatives
            .into_iter()
            .map(|rhs| self.add_production(lhs, rhs))
            .collect()
    }

    /// Rewrites the bodies of the productions `lhs` already owns, in id order.
    pub fn replace_alternatives(
        &mut self,
        lhs: Symbol,
        alternatives: Vec<Vec<Symbol>>,
    ) -> Result<(), GrammarError> {
        let owned: Vec<usize> = self
            .productions
            .iter()
            .enumerate()
            .filter(|(_, production)| production.lhs == lhs)
            .map(|(i, _)| i)
            .collect();

        if owned.len() != alternatives.len() {
            return Err(GrammarError::MismatchedAlternatives {
                lhs: self.name_of(lhs),
                expected: owned.len(),
                found: alternatives.len(),
            });
        }

        let mut checked = Vec::with_capacity(alternatives.len());
        for rhs in alternatives {
            checked.push(self.check_alternative(lhs, rhs)?);
        }
        for (i, rhs) in owned.into_iter().zip(checked) {
            self.productions[i].rhs = rhs;
        }
        Ok(())
    }

    pub fn compile(self, start: Symbol) -> Result<Grammar, GrammarError> {
        let Some(start_index) = start.nonterminal_index().filter(|&i| i < self.nonterminal_names.len()) else {
            return Err(GrammarError::NotANonterminal(self.name_of(start)));
        };

        let mut index: Vec<Vec<ProductionId>> = Vec::new();
        index.resize_with(self.nonterminal_names.len(), Vec::new);
        for (i, production) in self.productions.iter().enumerate() {
            if let Some(nt) = production.lhs.nonterminal_index() {
                index[nt].push(ProductionId::new(i));
            }
        }

        if index[start_index].is_empty() {
            return Err(GrammarError::NoStartProductions(self.name_of(start)));
        }

        for (nt, owned) in index.iter().enumerate() {
            if owned.is_empty() {
                log::debug!("nonterminal `{}` has no productions", self.nonterminal_names[nt]);
            }
        }

        Ok(Grammar {
            terminal_names: self.terminal_names,
            nonterminal_names: self.nonterminal_names,
            productions: self.productions,
            index,
            start,
        })
    }

    fn check_alternative(&self, lhs: Symbol, rhs: Vec<Symbol>) -> Result<Vec<Symbol>, GrammarError> {
        if !self.is_declared(lhs) || !lhs.is_nonterminal() {
            return Err(GrammarError::NotANonterminal(self.name_of(lhs)));
        }
        if rhs.is_empty() {
            return Ok(vec![Symbol::EPSILON]);
        }
        if rhs.contains(&Symbol::EPSILON) {
            if rhs.len() == 1 {
                return Ok(rhs);
            }
            return Err(GrammarError::MisplacedEpsilon(self.name_of(lhs)));
        }
        if let Some(bad) = rhs.iter().find(|s| !self.is_declared(**s)) {
            return Err(GrammarError::UndeclaredSymbol(bad.raw(), self.name_of(lhs)));
        }
        Ok(rhs)
    }

    fn is_declared(&self, symbol: Symbol) -> bool {
        match (symbol.terminal_index(), symbol.nonterminal_index()) {
            (Some(t), _) => t < self.terminal_names.len(),
            (_, Some(nt)) => nt < self.nonterminal_names.len(),
            _ => false,
        }
    }

    fn name_of(&self, symbol: Symbol) -> String {
        symbol_name(&self.terminal_names, &self.nonterminal_names, symbol)
    }
}

fn symbol_name(terminals: &[String], nonterminals: &[String], symbol: Symbol) -> String {
    let name = match (symbol.terminal_index(), symbol.nonterminal_index()) {
        (Some(t), _) => terminals.get(t),
        (_, Some(nt)) => nonterminals.get(nt),
        _ => None,
    };
    match name {
        Some(name) => name.clone(),
        None => match symbol.class() {
            SymbolClass::Epsilon => "ε".to_string(),
            SymbolClass::EndOfInput => "$".to_string(),
            SymbolClass::Error => "error".to_string(),
            _ => format!("#{}", symbol.raw()),
        },
    }
}

/// Compiled, immutable context-free grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
    terminal_names: Vec<String>,
    nonterminal_names: Vec<String>,
    productions: Vec<Production>,
    // productions owned by each nonterminal, in id order
    index: Vec<Vec<ProductionId>>,
    start: Symbol,
}

impl Grammar {
    pub fn start(&self) -> Symbol {
        self.start
    }

    pub fn n_terminals(&self) -> usize {
        self.terminal_names.len()
    }

    pub fn n_nonterminals(&self) -> usize {
        self.nonterminal_names.len()
    }

    pub fn n_productions(&self) -> usize {
        self.productions.len()
    }

    pub fn terminals(&self) -> impl Iterator<Item = Symbol> + '_ {
        (0..self.n_terminals()).map(Symbol::terminal)
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = Symbol> + '_ {
        (0..self.n_nonterminals()).map(Symbol::nonterminal)
    }

    pub fn productions(&self) -> impl Iterator<Item = (ProductionId, &Production)> {
        self.productions
            .iter()
            .enumerate()
            .map(|(i, production)| (ProductionId::new(i), production))
    }

    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id]
    }

    /// Productions whose left-hand side is `nonterminal`. Empty for anything
    /// that is not a nonterminal of this grammar.
    pub fn productions_for(&self, nonterminal: Symbol) -> &[ProductionId] {
        nonterminal
            .nonterminal_index()
            .and_then(|nt| self.index.get(nt))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn symbol_name(&self, symbol: Symbol) -> String {
        symbol_name(&self.terminal_names, &self.nonterminal_names, symbol)
    }

    pub fn format_production(&self, id: ProductionId) -> String {
        let production = self.production(id);
        let rhs: Vec<String> = production
            .rhs()
            .iter()
            .map(|s| self.symbol_name(*s))
            .collect();
        format!("{} -> {}", self.symbol_name(production.lhs()), rhs.join(" "))
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (id, _) in self.productions() {
            writeln!(f, "{:>3}: {}", id.index(), self.format_production(id))?;
        }
        Ok(())
    }
}
