use std::ops::Index;

use bit_set::BitSet;

use super::grammar::{Grammar, Symbol};

/// Set over the terminals of one grammar plus epsilon and end-of-input.
/// Bits are laid out in raw symbol order: terminal `i` is bit `i`, epsilon is
/// bit `|T|` and end-of-input is bit `|T| + 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolSet {
    data: BitSet,
    n_terminals: usize,
}

impl SymbolSet {
    pub fn new(n_terminals: usize) -> SymbolSet {
        SymbolSet {
            data: BitSet::with_capacity(n_terminals + 2),
            n_terminals,
        }
    }

    fn bit(&self, symbol: Symbol) -> Option<usize> {
        match symbol {
            Symbol::EPSILON => Some(self.n_terminals),
            Symbol::EOF => Some(self.n_terminals + 1),
            _ => symbol.terminal_index().filter(|&t| t < self.n_terminals),
        }
    }

    fn symbol(&self, bit: usize) -> Symbol {
        if bit < self.n_terminals {
            Symbol::terminal(bit)
        } else if bit == self.n_terminals {
            Symbol::EPSILON
        } else {
            Symbol::EOF
        }
    }

    /// Returns whether the set grew. Symbols without a bit are ignored.
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        match self.bit(symbol) {
            Some(bit) => self.data.insert(bit),
            None => false,
        }
    }

    pub fn remove(&mut self, symbol: Symbol) -> bool {
        match self.bit(symbol) {
            Some(bit) => self.data.remove(bit),
            None => false,
        }
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.bit(symbol).is_some_and(|bit| self.data.contains(bit))
    }

    pub fn contains_epsilon(&self) -> bool {
        self.contains(Symbol::EPSILON)
    }

    /// Returns whether the set grew.
    pub fn union_with(&mut self, other: &SymbolSet) -> bool {
        let before = self.data.len();
        self.data.union_with(&other.data);
        self.data.len() != before
    }

    pub fn is_subset(&self, other: &SymbolSet) -> bool {
        self.data.is_subset(&other.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Members in ascending raw symbol order.
    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.data.iter().map(|bit| self.symbol(bit))
    }
}

/// FIRST sets for every terminal, nonterminal, epsilon and end-of-input of a
/// grammar.
#[derive(Clone, Debug)]
pub struct FirstSets {
    // terminals, then nonterminals, then epsilon, then end-of-input
    sets: Vec<SymbolSet>,
    n_terminals: usize,
    n_nonterminals: usize,
    passes: usize,
}

impl FirstSets {
    /// Initial state of the solver: FIRST(t) = {t} for terminals, epsilon and
    /// end-of-input, empty for nonterminals.
    pub fn new_seeded(grammar: &Grammar) -> FirstSets {
        let n_terminals = grammar.n_terminals();
        let n_nonterminals = grammar.n_nonterminals();
        let mut sets = vec![SymbolSet::new(n_terminals); n_terminals + n_nonterminals + 2];

        for terminal in grammar.terminals() {
            sets[terminal.raw() as usize].insert(terminal);
        }
        sets[n_terminals + n_nonterminals].insert(Symbol::EPSILON);
        sets[n_terminals + n_nonterminals + 1].insert(Symbol::EOF);

        FirstSets {
            sets,
            n_terminals,
            n_nonterminals,
            passes: 0,
        }
    }

    pub fn compute(grammar: &Grammar) -> FirstSets {
        let mut first = FirstSets::new_seeded(grammar);
        while first.step(grammar) {}
        log::debug!("FIRST sets converged after {} passes", first.passes);
        first
    }

    /// One pass over every production. Returns whether any set grew.
    pub fn step(&mut self, grammar: &Grammar) -> bool {
        let mut changed = false;
        for (_, production) in grammar.productions() {
            let rhs_symbols = production.rhs();
            let k = rhs_symbols.len();

            let mut rhs = self[rhs_symbols[0]].clone();
            rhs.remove(Symbol::EPSILON);

            let mut i = 0;
            while i + 1 < k && self[rhs_symbols[i]].contains_epsilon() {
                let had_epsilon = rhs.contains_epsilon();
                rhs.union_with(&self[rhs_symbols[i + 1]]);
                if !had_epsilon {
                    rhs.remove(Symbol::EPSILON);
                }
                i += 1;
            }

            if i + 1 == k && self[rhs_symbols[k - 1]].contains_epsilon() {
                rhs.insert(Symbol::EPSILON);
            }

            if let Some(slot) = self.slot(production.lhs()) {
                changed |= self.sets[slot].union_with(&rhs);
            }
        }
        self.passes += 1;
        changed
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn get(&self, symbol: Symbol) -> Option<&SymbolSet> {
        self.slot(symbol).map(|slot| &self.sets[slot])
    }

    /// FIRST of a sequence of symbols. Contains epsilon only if every symbol
    /// of the sequence is nullable (in particular for the empty sequence).
    pub fn of_sequence(&self, symbols: &[Symbol]) -> SymbolSet {
        let mut result = SymbolSet::new(self.n_terminals);
        for symbol in symbols {
            let first = &self[*symbol];
            result.union_with(first);
            result.remove(Symbol::EPSILON);
            if !first.contains_epsilon() {
                return result;
            }
        }
        result.insert(Symbol::EPSILON);
        result
    }

    fn slot(&self, symbol: Symbol) -> Option<usize> {
        let offset = self.n_terminals + self.n_nonterminals;
        match symbol {
            Symbol::EPSILON => Some(offset),
            Symbol::EOF => Some(offset + 1),
            _ => match (symbol.terminal_index(), symbol.nonterminal_index()) {
                (Some(t), _) if t < self.n_terminals => Some(t),
                (_, Some(nt)) if nt < self.n_nonterminals => Some(self.n_terminals + nt),
                _ => None,
            },
        }
    }
}

impl Index<Symbol> for FirstSets {
    type Output = SymbolSet;

    fn index(&self, symbol: Symbol) -> &Self::Output {
        match self.get(symbol) {
            Some(set) => set,
            None => panic!("FIRST is undefined for symbol {}", symbol.raw()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::grammar::GrammarBuilder;

    use super::*;

    // S -> A b | c ; A -> a A | ε
    fn nullable_grammar() -> (Grammar, [Symbol; 5]) {
        let mut builder = GrammarBuilder::new();
        let a = builder.terminal("a").unwrap();
        let b = builder.terminal("b").unwrap();
        let c = builder.terminal("c").unwrap();
        let s = builder.nonterminal("S").unwrap();
        let big_a = builder.nonterminal("A").unwrap();
        builder.add_productions(s, [vec![big_a, b], vec![c]]).unwrap();
        builder.add_productions(big_a, [vec![a, big_a], vec![]]).unwrap();
        (builder.compile(s).unwrap(), [a, b, c, s, big_a])
    }

    fn members(set: &SymbolSet) -> Vec<Symbol> {
        set.iter().collect()
    }

    #[test]
    fn terminals_are_their_own_first() {
        let (grammar, _) = nullable_grammar();
        let first = FirstSets::compute(&grammar);
        for terminal in grammar.terminals() {
            assert_eq!(members(&first[terminal]), vec![terminal]);
        }
        assert_eq!(members(&first[Symbol::EOF]), vec![Symbol::EOF]);
        assert_eq!(members(&first[Symbol::EPSILON]), vec![Symbol::EPSILON]);
    }

    #[test]
    fn nullable_prefix_exposes_following_symbol() {
        let (grammar, [a, b, c, s, big_a]) = nullable_grammar();
        let first = FirstSets::compute(&grammar);

        assert_eq!(members(&first[big_a]), vec![a, Symbol::EPSILON]);
        assert_eq!(members(&first[s]), vec![a, b, c]);
        assert!(!first[s].contains_epsilon());
        assert!(first.get(Symbol::ERROR).is_none());
    }

    #[test]
    fn passes_only_grow_sets() {
        let (grammar, _) = nullable_grammar();
        let mut first = FirstSets::new_seeded(&grammar);
        loop {
            let before = first.clone();
            let changed = first.step(&grammar);
            for nonterminal in grammar.nonterminals() {
                assert!(before[nonterminal].is_subset(&first[nonterminal]));
            }
            if !changed {
                break;
            }
        }
        assert!(first.passes() >= 2);
    }

    #[test]
    fn sequence_first() {
        let (grammar, [a, b, _, _, big_a]) = nullable_grammar();
        let first = FirstSets::compute(&grammar);
        assert_eq!(members(&first.of_sequence(&[big_a, b])), vec![a, b]);
        assert_eq!(members(&first.of_sequence(&[big_a, big_a])), vec![a, Symbol::EPSILON]);
        assert_eq!(members(&first.of_sequence(&[])), vec![Symbol::EPSILON]);
    }
}
