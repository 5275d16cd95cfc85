use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Syntax error in {path} at line {line}, column {column}: {message}")]
    Syntax {
        path: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("File coverage not found: {0}")]
    NotFound(String),

    #[error("Cannot merge coverage for '{found}' into coverage for '{expected}'")]
    PathMismatch { expected: String, found: String },

    #[error(
        "Branch {branch} of {path} has {expected} outcomes but the merged coverage has {found}"
    )]
    BranchShapeMismatch {
        path: String,
        branch: u32,
        expected: usize,
        found: usize,
    },

    #[error("Source map error: {0}")]
    SourceMap(String),
}

pub type Result<T> = std::result::Result<T, CovError>;
