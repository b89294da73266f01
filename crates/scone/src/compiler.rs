use std::time::Instant;

use thiserror::Error;

use crate::{
    codegen::bytecode::Program,
    language::Language,
    parser::{
        driver::{ParseError, Parser},
        first::FirstSets,
        follow::FollowSets,
        grammar::{Grammar, GrammarError},
        lr::CanonicalCollection,
        lr_table::{LRTables, TableError, TableOptions},
    },
    scanner,
    semantics::emitter::{Emitter, SemanticError},
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid grammar")]
    Grammar(#[from] GrammarError),
    #[error("failed to build parse tables")]
    Table(#[from] TableError),
}

pub type CompileError = ParseError<SemanticError>;

/// The scone grammar together with everything derived from it. Building is the
/// expensive part; a compiler can then translate any number of sources.
pub struct Compiler {
    language: Language,
    first: FirstSets,
    follow: FollowSets,
    collection: CanonicalCollection,
    tables: LRTables,
}

impl Compiler {
    pub fn new() -> Result<Compiler, BuildError> {
        Compiler::with_options(&TableOptions::default())
    }

    pub fn with_options(options: &TableOptions) -> Result<Compiler, BuildError> {
        let start = Instant::now();
        let language = Language::new()?;
        let grammar = language.grammar();

        let first = FirstSets::compute(grammar);
        let follow = FollowSets::compute(grammar, &first);
        let collection = CanonicalCollection::build(grammar, &first);
        let tables = LRTables::from_collection(grammar, &collection, options)?;
        log::debug!(
            "built {} states for {} productions in {:?}",
            tables.n_states(),
            grammar.n_productions(),
            start.elapsed()
        );

        Ok(Compiler {
            language,
            first,
            follow,
            collection,
            tables,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        self.language.grammar()
    }

    pub fn first_sets(&self) -> &FirstSets {
        &self.first
    }

    pub fn follow_sets(&self) -> &FollowSets {
        &self.follow
    }

    pub fn collection(&self) -> &CanonicalCollection {
        &self.collection
    }

    pub fn tables(&self) -> &LRTables {
        &self.tables
    }

    /// Scans `source` on a separate thread and parses it into a program.
    pub fn compile(&self, source: &str) -> Result<Program, CompileError> {
        let tokens = scanner::spawn(source.to_string());
        let parser = Parser::new(self.grammar(), &self.tables);
        parser.parse(tokens, &mut Emitter::new())
    }
}
