pub mod driver;
pub mod first;
pub mod follow;
pub mod grammar;
pub mod lr;
pub mod lr_table;
