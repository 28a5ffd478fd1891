//! Error types
//!
//! One enum per concern. Tool errors never reach the wire as protocol
//! errors: the dispatcher folds them into an `isError` tool result.

use std::path::PathBuf;

/// Failure of a tool handler, including argument validation
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("missing required parameter: {0}")]
    MissingParam(String),

    #[error("parameter {name} must be {expected}")]
    InvalidParam { name: String, expected: &'static str },

    #[error("command denied: {0}")]
    Denied(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ToolError {
    pub fn missing(name: impl Into<String>) -> Self {
        ToolError::MissingParam(name.into())
    }

    pub fn invalid(name: impl Into<String>, expected: &'static str) -> Self {
        ToolError::InvalidParam { name: name.into(), expected }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ToolError::NotFound(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        ToolError::Other(msg.into())
    }
}

/// Async task manager errors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task {0} is still running")]
    StillRunning(String),
}

/// Registration errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// Fatal transport errors - the only errors that stop the dispatch loop
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("frame exceeds maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid log filter '{0}'")]
    LogFilter(String),

    #[error("logging already initialised: {0}")]
    LogInit(String),
}
