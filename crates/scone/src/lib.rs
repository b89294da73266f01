pub mod codegen;
pub mod language;
pub mod parser;
pub mod runtime;
pub mod scanner;
pub mod semantics;

mod compiler;

pub use compiler::{BuildError, CompileError, Compiler};
