//! Error types for reference structure input

use rmsd_algos::RmsdError;
use thiserror::Error;

/// Errors that can occur while reading a reference structure
#[derive(Error, Debug)]
pub enum IoError {
    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error with location information
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// Line number where the error occurred (1-based)
        line: usize,
        /// Error message
        message: String,
    },

    /// File contains no ATOM/HETATM records
    #[error("Empty file or no atoms found")]
    EmptyFile,

    /// The structure was read but the model rejected it
    #[error("RMSD configuration failed: {0}")]
    Rmsd(#[from] RmsdError),
}

impl IoError {
    /// Create a parse error at a specific line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        IoError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type for reference structure input
pub type IoResult<T> = Result<T, IoError>;
