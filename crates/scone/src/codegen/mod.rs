pub mod bytecode;
pub mod encoding;
