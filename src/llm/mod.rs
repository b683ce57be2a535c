pub mod backend;
pub mod client;
pub mod parse;
pub mod prompt;
