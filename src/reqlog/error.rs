use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReqlogError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Document not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a request log document: {0}")]
    NotRequestLog(PathBuf),

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReqlogError>;
