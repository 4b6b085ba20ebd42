//! Error types for canvas export

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting a canvas
#[derive(Error, Debug)]
pub enum Error {
    /// The requested document is missing, not a canvas, or has nothing to draw
    #[error("Invalid export target: {0}")]
    InvalidTarget(String),

    /// A box used for framing has no area
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Some nodes never finished mounting
    #[error("Canvas did not finish loading after {waited_ms}ms ({} node(s) pending: {})", pending.len(), pending.join(", "))]
    RenderTimeout { pending: Vec<String>, waited_ms: u64 },

    /// The rasterizer refused or failed to produce an image
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Another export of the same document is in flight
    #[error("Export already in progress for document {0}")]
    Busy(String),

    /// The host does not provide an optional capability
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A canvas file could not be parsed or validated
    #[error("Failed to parse canvas: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidTarget,
    DegenerateGeometry,
    RenderTimeout,
    CaptureFailure,
    Busy,
    Other,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidTarget(_) => ErrorCategory::InvalidTarget,
            Error::DegenerateGeometry(_) => ErrorCategory::DegenerateGeometry,
            Error::RenderTimeout { .. } => ErrorCategory::RenderTimeout,
            Error::CaptureFailed(_) => ErrorCategory::CaptureFailure,
            Error::Busy(_) => ErrorCategory::Busy,
            Error::Unsupported(_) | Error::Parse(_) | Error::Io(_) => ErrorCategory::Other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_lists_pending_nodes() {
        let err = Error::RenderTimeout {
            pending: vec!["a".into(), "b".into()],
            waited_ms: 15000,
        };
        let msg = err.to_string();
        assert!(msg.contains("did not finish loading"));
        assert!(msg.contains("15000ms"));
        assert!(msg.contains("a, b"));
        assert_eq!(err.category(), ErrorCategory::RenderTimeout);
    }

    #[test]
    fn json_errors_become_parse_errors() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.category(), ErrorCategory::Other);
    }
}
