//! Error taxonomy shared by every stage.
//!
//! Structural failures (unparseable source, missing or corrupt execution
//! report, subprocess trouble) are returned as `Err` and abort the stage.
//! Per-item LLM failures never reach this type's callers: the bounded
//! runner in `executor::run` turns them into `None`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error in test source at line {line}, column {column}")]
    Syntax { line: usize, column: usize },

    #[error("test run did not produce a report at {}: {stderr}", path.display())]
    ReportMissing { path: PathBuf, stderr: String },

    #[error("malformed execution report: {0}")]
    Report(String),

    #[error("test run exceeded the {secs}s ceiling")]
    Timeout { secs: u64 },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not import module '{0}'")]
    ModuleNotFound(String),

    #[error("function '{function}' not found in module '{module}'")]
    FunctionNotFound { module: String, function: String },

    #[error("introspection failed: {0}")]
    Introspect(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("unusable structured response: {0}")]
    StructuredResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse class used by the CLI to pick the printed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    MalformedInput,
    Unexpected,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorKind::FileNotFound
            }
            Error::ModuleNotFound(_) | Error::FunctionNotFound { .. } => ErrorKind::FileNotFound,
            Error::Syntax { .. } | Error::Json(_) | Error::Report(_) | Error::Config(_) => {
                ErrorKind::MalformedInput
            }
            _ => ErrorKind::Unexpected,
        }
    }
}
