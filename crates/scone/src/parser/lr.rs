use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt::Display,
};

use petgraph::graph::DiGraph;

use super::{
    first::FirstSets,
    grammar::{Grammar, ProductionId, Symbol},
};

pub type LRState = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LR1Item {
    pub production: ProductionId,
    pub dot_position: usize,
    pub lookahead: Symbol,
}

impl LR1Item {
    pub fn new(production: ProductionId, dot_position: usize, lookahead: Symbol) -> LR1Item {
        LR1Item {
            production,
            dot_position,
            lookahead,
        }
    }

    /// Symbol immediately after the dot, if the dot is not at the end.
    pub fn next_symbol(&self, grammar: &Grammar) -> Option<Symbol> {
        grammar
            .production(self.production)
            .body()
            .get(self.dot_position)
            .copied()
    }

    pub fn is_complete(&self, grammar: &Grammar) -> bool {
        self.dot_position == grammar.production(self.production).len()
    }

    pub fn display<'a>(&'a self, grammar: &'a Grammar) -> DisplayItem<'a> {
        DisplayItem { item: self, grammar }
    }
}

pub struct DisplayItem<'a> {
    item: &'a LR1Item,
    grammar: &'a Grammar,
}

impl Display for DisplayItem<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let production = self.grammar.production(self.item.production);
        write!(f, "[{} ->", self.grammar.symbol_name(production.lhs()))?;
        for (i, symbol) in production.body().iter().enumerate() {
            if i == self.item.dot_position {
                write!(f, " .")?;
            }
            write!(f, " {}", self.grammar.symbol_name(*symbol))?;
        }
        if self.item.dot_position == production.len() {
            write!(f, " .")?;
        }
        write!(f, ", {}]", self.grammar.symbol_name(self.item.lookahead))
    }
}

/// Items in insertion order, with a hash set for membership tests.
#[derive(Clone, Debug, Default)]
pub struct LR1ItemSet {
    items: Vec<LR1Item>,
    members: HashSet<LR1Item>,
}

impl LR1ItemSet {
    pub fn new() -> LR1ItemSet {
        Default::default()
    }

    pub fn insert(&mut self, item: LR1Item) -> bool {
        let inserted = self.members.insert(item);
        if inserted {
            self.items.push(item);
        }
        inserted
    }

    pub fn contains(&self, item: &LR1Item) -> bool {
        self.members.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LR1Item> {
        self.items.iter()
    }

    // canonical form used to merge states with the same items
    fn key(&self) -> Vec<LR1Item> {
        let mut key = self.items.clone();
        key.sort_unstable();
        key
    }
}

impl PartialEq for LR1ItemSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for LR1ItemSet {}

impl FromIterator<LR1Item> for LR1ItemSet {
    fn from_iter<I: IntoIterator<Item = LR1Item>>(iter: I) -> Self {
        let mut set = LR1ItemSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

/// Adds every item reachable without consuming input. For an item with a
/// nonterminal `C` after the dot, the new items for `C` take their lookaheads
/// from FIRST of the single symbol following `C`, or the item's own lookahead
/// when `C` ends the body.
pub fn closure(grammar: &Grammar, first: &FirstSets, items: LR1ItemSet) -> LR1ItemSet {
    let mut set = items;
    loop {
        let before = set.len();
        for i in 0..before {
            let item = set.items[i];
            let body = grammar.production(item.production).body();
            let Some(&next) = body.get(item.dot_position) else {
                continue;
            };
            if !next.is_nonterminal() {
                continue;
            }

            let propagated = body
                .get(item.dot_position + 1)
                .copied()
                .unwrap_or(item.lookahead);
            let lookaheads: Vec<Symbol> = first[propagated].iter().collect();

            for &production in grammar.productions_for(next) {
                for &lookahead in &lookaheads {
                    set.insert(LR1Item::new(production, 0, lookahead));
                }
            }
        }

        if set.len() == before {
            return set;
        }
    }
}

/// Advances the dot over `symbol` in every item that allows it, then closes the
/// result. Empty when no item has `symbol` after its dot.
pub fn goto(grammar: &Grammar, first: &FirstSets, items: &LR1ItemSet, symbol: Symbol) -> LR1ItemSet {
    let kernel = items
        .iter()
        .filter(|item| item.next_symbol(grammar) == Some(symbol))
        .map(|item| LR1Item::new(item.production, item.dot_position + 1, item.lookahead))
        .collect();
    closure(grammar, first, kernel)
}

/// Every distinct LR(1) state reachable from the start state, together with the
/// transitions found while building them.
#[derive(Clone, Debug)]
pub struct CanonicalCollection {
    states: Vec<LR1ItemSet>,
    transitions: BTreeMap<(LRState, Symbol), LRState>,
}

impl CanonicalCollection {
    pub fn build(grammar: &Grammar, first: &FirstSets) -> CanonicalCollection {
        let start_items = grammar
            .productions_for(grammar.start())
            .iter()
            .map(|&production| LR1Item::new(production, 0, Symbol::EOF))
            .collect();

        let initial = closure(grammar, first, start_items);
        let mut index: HashMap<Vec<LR1Item>, LRState> = HashMap::new();
        index.insert(initial.key(), 0);
        let mut states = vec![initial];
        let mut transitions = BTreeMap::new();

        // states are appended while we walk, every state is expanded exactly once
        let mut current = 0;
        while current < states.len() {
            let symbols: BTreeSet<Symbol> = states[current]
                .iter()
                .filter_map(|item| item.next_symbol(grammar))
                .collect();

            for symbol in symbols {
                let target = goto(grammar, first, &states[current], symbol);
                let key = target.key();
                let next = match index.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        let created = states.len();
                        index.insert(key, created);
                        states.push(target);
                        created
                    }
                };
                transitions.insert((current, symbol), next);
            }
            current += 1;
        }

        log::debug!(
            "canonical collection: {} states, {} transitions",
            states.len(),
            transitions.len()
        );
        CanonicalCollection { states, transitions }
    }

    pub fn n_states(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, state: LRState) -> &LR1ItemSet {
        &self.states[state]
    }

    pub fn states(&self) -> impl Iterator<Item = (LRState, &LR1ItemSet)> {
        self.states.iter().enumerate()
    }

    pub fn transition(&self, state: LRState, symbol: Symbol) -> Option<LRState> {
        self.transitions.get(&(state, symbol)).copied()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (LRState, Symbol, LRState)> + '_ {
        self.transitions
            .iter()
            .map(|(&(from, symbol), &to)| (from, symbol, to))
    }

    /// State graph with item listings as node labels and symbols as edge
    /// labels, for dot output.
    pub fn to_graph(&self, grammar: &Grammar) -> DiGraph<String, String> {
        let mut graph = DiGraph::new();
        let nodes: Vec<_> = self
            .states()
            .map(|(i, state)| {
                let mut label = format!("I{}", i);
                for item in state.iter() {
                    label.push('\n');
                    label.push_str(&item.display(grammar).to_string());
                }
                graph.add_node(label)
            })
            .collect();

        for (from, symbol, to) in self.transitions() {
            graph.add_edge(nodes[from], nodes[to], grammar.symbol_name(symbol));
        }
        graph
    }
}
