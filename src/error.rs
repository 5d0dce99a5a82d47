//! Error types for the pdfsift library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pdfsift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
///
/// Only [`Error::InvalidDocument`], [`Error::NotFound`], [`Error::NotAFile`],
/// [`Error::PayloadTooLarge`] and [`Error::Io`] ever reach the caller of the
/// extraction entry points. The remaining kinds are raised inside the engine
/// and absorbed into the result's `warnings`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The data does not start with a `%PDF-` header.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// Low-level syntax damage at a byte offset.
    #[error("Malformed object at offset {offset}: {reason}")]
    MalformedObject { offset: usize, reason: String },

    /// An indirect reference that the cross-reference data cannot satisfy.
    #[error("Unresolvable reference {id} {generation} R")]
    UnresolvableReference { id: u32, generation: u16 },

    /// A stream uses a decode filter this engine does not implement.
    #[error("Unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    /// A supported filter failed on corrupt input.
    #[error("{filter} failed: {reason}")]
    StreamDecode { filter: String, reason: String },

    /// No document catalog could be located, even by scanning.
    #[error("Invalid or corrupted PDF: {0}")]
    InvalidDocument(String),

    /// The input path does not exist.
    #[error("PDF file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The input path exists but is not a regular file.
    #[error("Path is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// An uploaded payload exceeds the configured ceiling.
    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Error during rendering (JSON).
    #[error("Rendering error: {0}")]
    Render(String),
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error is caused by the caller's input rather than by
    /// a failure inside the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownFormat
                | Error::InvalidDocument(_)
                | Error::NotFound(_)
                | Error::NotAFile(_)
                | Error::PayloadTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnresolvableReference {
            id: 12,
            generation: 0,
        };
        assert_eq!(err.to_string(), "Unresolvable reference 12 0 R");

        let err = Error::NotFound(PathBuf::from("missing.pdf"));
        assert_eq!(err.to_string(), "PDF file not found: missing.pdf");

        let err = Error::malformed(42, "unterminated array");
        assert_eq!(
            err.to_string(),
            "Malformed object at offset 42: unterminated array"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::InvalidDocument("no catalog".into()).is_client_error());
        assert!(Error::NotAFile(PathBuf::from("/tmp")).is_client_error());
        assert!(Error::PayloadTooLarge { size: 10, limit: 5 }.is_client_error());
        assert!(!Error::Render("boom".into()).is_client_error());
    }
}
