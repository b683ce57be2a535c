pub mod ast;
pub mod spans;
