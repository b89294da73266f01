pub mod emitter;
pub mod symtab;
pub mod types;
