use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EtlError {
    #[error("request failed: {0}")]
    #[diagnostic(help("the endpoint may be unreachable; re-run the fetch stage to retry"))]
    Network(String),

    #[error("endpoint returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("raw dataset is not valid JSON: {0}")]
    RawDecode(String),

    #[error("raw dataset is not a JSON array")]
    RawNotArray,

    #[error("record {index} is missing required field `{field}`")]
    Schema { index: usize, field: &'static str },

    #[error("record {index} is malformed: {reason}")]
    RecordShape { index: usize, reason: String },

    #[error("dataset must not be empty")]
    EmptyDataset,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("input file not found: {0}")]
    #[diagnostic(help("run the preceding pipeline stage first"))]
    MissingInput(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("secret lookup failed: {0}")]
    Secret(String),
}

impl EtlError {
    /// Pipeline stage the error belongs to, used in logs and CLI output.
    pub fn stage(&self) -> &'static str {
        match self {
            EtlError::Network(_) | EtlError::HttpStatus { .. } => "fetch",
            EtlError::RawDecode(_)
            | EtlError::RawNotArray
            | EtlError::Schema { .. }
            | EtlError::RecordShape { .. } => "clean",
            EtlError::EmptyDataset | EtlError::Storage(_) => "load",
            EtlError::ConfigRead(_)
            | EtlError::ConfigParse(_)
            | EtlError::InvalidConfig(_)
            | EtlError::Secret(_) => "config",
            EtlError::MissingInput(_) | EtlError::Filesystem(_) => "io",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, EtlError::Network(_) | EtlError::HttpStatus { .. })
    }
}

impl From<rusqlite::Error> for EtlError {
    fn from(err: rusqlite::Error) -> Self {
        EtlError::Storage(err.to_string())
    }
}
