pub mod health;
pub mod interpret;
pub mod parse;
