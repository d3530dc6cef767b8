//! Error taxonomy shared by the asset and renderer crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed model source. The whole parse is aborted.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Attribute set or size does not match what a vertex format or mesh expects.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// GPU buffer or texture allocation failed.
    #[error("Resource allocation failed: {0}")]
    ResourceAllocation(String),

    #[error("Index {index} out of range (len={len})")]
    OutOfRange { index: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_line() {
        let err = CoreError::parse(7, "bad coordinate");
        assert_eq!(err.to_string(), "Parse error on line 7: bad coordinate");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
