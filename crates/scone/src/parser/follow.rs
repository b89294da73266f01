use std::ops::Index;

use super::{
    first::{FirstSets, SymbolSet},
    grammar::{Grammar, Symbol},
};

/// FOLLOW sets for the nonterminals of a grammar.
///
/// The LR(1) table builder works from item lookaheads and never consults these;
/// they are kept for inspection and for grammar debugging.
#[derive(Clone, Debug)]
pub struct FollowSets {
    sets: Vec<SymbolSet>,
    passes: usize,
}

impl FollowSets {
    pub fn compute(grammar: &Grammar, first: &FirstSets) -> FollowSets {
        let mut sets = vec![SymbolSet::new(grammar.n_terminals()); grammar.n_nonterminals()];
        if let Some(start) = grammar.start().nonterminal_index() {
            sets[start].insert(Symbol::EOF);
        }

        let mut passes = 0;
        loop {
            let mut changed = false;
            for (_, production) in grammar.productions() {
                let Some(lhs) = production.lhs().nonterminal_index() else {
                    continue;
                };
                let mut trailer = sets[lhs].clone();

                for symbol in production.body().iter().rev() {
                    let symbol_first = &first[*symbol];
                    match symbol.nonterminal_index() {
                        Some(nt) => {
                            changed |= sets[nt].union_with(&trailer);
                            if symbol_first.contains_epsilon() {
                                let had_epsilon = trailer.contains_epsilon();
                                trailer.union_with(symbol_first);
                                if !had_epsilon {
                                    trailer.remove(Symbol::EPSILON);
                                }
                            } else {
                                trailer = symbol_first.clone();
                            }
                        }
                        None => trailer = symbol_first.clone(),
                    }
                }
            }
            passes += 1;
            if !changed {
                break;
            }
        }

        log::debug!("FOLLOW sets converged after {} passes", passes);
        FollowSets { sets, passes }
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn get(&self, nonterminal: Symbol) -> Option<&SymbolSet> {
        nonterminal
            .nonterminal_index()
            .and_then(|nt| self.sets.get(nt))
    }
}

impl Index<Symbol> for FollowSets {
    type Output = SymbolSet;

    fn index(&self, nonterminal: Symbol) -> &Self::Output {
        match self.get(nonterminal) {
            Some(set) => set,
            None => panic!("FOLLOW is only defined for nonterminals, got symbol {}", nonterminal.raw()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::grammar::GrammarBuilder;

    use super::*;

    #[test]
    fn expression_grammar_follow() {
        // Goal -> Expr ; Expr -> Expr + Term | Term ; Term -> Term * Factor | Factor ;
        // Factor -> ( Expr ) | num
        let mut builder = GrammarBuilder::new();
        let plus = builder.terminal("+").unwrap();
        let star = builder.terminal("*").unwrap();
        let lparen = builder.terminal("(").unwrap();
        let rparen = builder.terminal(")").unwrap();
        let num = builder.terminal("num").unwrap();
        let goal = builder.nonterminal("Goal").unwrap();
        let expr = builder.nonterminal("Expr").unwrap();
        let term = builder.nonterminal("Term").unwrap();
        let factor = builder.nonterminal("Factor").unwrap();
        builder.add_production(goal, vec![expr]).unwrap();
        builder.add_productions(expr, [vec![expr, plus, term], vec![term]]).unwrap();
        builder.add_productions(term, [vec![term, star, factor], vec![factor]]).unwrap();
        builder.add_productions(factor, [vec![lparen, expr, rparen], vec![num]]).unwrap();
        let grammar = builder.compile(goal).unwrap();

        let first = FirstSets::compute(&grammar);
        let follow = FollowSets::compute(&grammar, &first);

        let members = |nt: Symbol| follow[nt].iter().collect::<Vec<_>>();
        assert_eq!(members(goal), vec![Symbol::EOF]);
        assert_eq!(members(expr), vec![plus, rparen, Symbol::EOF]);
        assert_eq!(members(term), vec![plus, star, rparen, Symbol::EOF]);
        assert_eq!(members(factor), vec![plus, star, rparen, Symbol::EOF]);
    }

    #[test]
    fn nullable_suffix_passes_follow_through() {
        // S -> A B c ; A -> a ; B -> b | ε
        let mut builder = GrammarBuilder::new();
        let a = builder.terminal("a").unwrap();
        let b = builder.terminal("b").unwrap();
        let c = builder.terminal("c").unwrap();
        let s = builder.nonterminal("S").unwrap();
        let big_a = builder.nonterminal("A").unwrap();
        let big_b = builder.nonterminal("B").unwrap();
        builder.add_production(s, vec![big_a, big_b, c]).unwrap();
        builder.add_production(big_a, vec![a]).unwrap();
        builder.add_productions(big_b, [vec![b], vec![]]).unwrap();
        let grammar = builder.compile(s).unwrap();

        let first = FirstSets::compute(&grammar);
        let follow = FollowSets::compute(&grammar, &first);

        assert_eq!(follow[big_a].iter().collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(follow[big_b].iter().collect::<Vec<_>>(), vec![c]);
        assert!(!follow[big_a].contains_epsilon());
        assert!(follow.get(a).is_none());
    }
}
