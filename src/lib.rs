pub mod commands;
pub mod config;
pub mod detectors;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod llm;
pub mod logger;
pub mod testgen;

pub use error::{Error, ErrorKind, Result};
