pub mod scone_lexemes;
