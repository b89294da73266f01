pub mod machine;
pub mod value;
