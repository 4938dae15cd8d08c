//! Line source error types.

use thiserror::Error;

/// Errors that end a line source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading from the underlying stream failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = SourceError::from(io_err);
        assert!(matches!(err, SourceError::Io(_)));
        assert_eq!(err.to_string(), "IO error: pipe closed");
    }
}
