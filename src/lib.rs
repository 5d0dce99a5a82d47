//! # pdfsift
//!
//! Page-level text and metadata extraction from PDF files.
//!
//! The whole stack is built in: a byte-level object parser, a
//! cross-reference resolver that rebuilds damaged tables by scanning, a
//! flattened page tree, a content stream interpreter and a text assembler
//! that understands simple-font encodings and `ToUnicode` maps.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfsift::{parse_file, render};
//!
//! fn main() -> pdfsift::Result<()> {
//!     let result = parse_file("document.pdf")?;
//!
//!     for page in &result.pages {
//!         println!("--- page {} ---\n{}", page.page, page.text);
//!     }
//!     for warning in &result.warnings {
//!         eprintln!("warning: {}", warning);
//!     }
//!
//!     let json = render::to_json(&result, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!     Ok(())
//! }
//! ```
//!
//! ## Damage handling
//!
//! Extraction only fails when no document catalog can be found at all.
//! Broken cross-reference data, dangling references, undecodable streams
//! and image-only pages are reported in [`ExtractionResult::warnings`].

pub mod content;
pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result};
pub use extract::{ExtractOptions, Extractor};
pub use model::{ExtractionResult, Metadata, PageText};
pub use render::JsonFormat;

use std::io::Read;
use std::path::Path;

/// Extract text and metadata from a PDF held in memory.
///
/// # Example
///
/// ```no_run
/// use pdfsift::parse_bytes;
///
/// let data = std::fs::read("document.pdf").unwrap();
/// let result = parse_bytes(&data).unwrap();
/// println!("Pages: {}", result.metadata.num_pages);
/// ```
pub fn parse_bytes(data: &[u8]) -> Result<ExtractionResult> {
    Extractor::default().parse(data)
}

/// Extract from bytes with custom options.
pub fn parse_bytes_with_options(data: &[u8], options: ExtractOptions) -> Result<ExtractionResult> {
    Extractor::new(options).parse(data)
}

/// Extract text and metadata from a PDF file.
///
/// Fails with [`Error::NotFound`] when the path does not exist and with
/// [`Error::NotAFile`] when it is a directory or other non-file.
///
/// # Example
///
/// ```no_run
/// use pdfsift::parse_file;
///
/// let result = parse_file("document.pdf").unwrap();
/// println!("{}", result.plain_text());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ExtractionResult> {
    Extractor::default().parse_file(path)
}

/// Extract from a file with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfsift::{parse_file_with_options, ExtractOptions};
///
/// let options = ExtractOptions::new().sequential();
/// let result = parse_file_with_options("document.pdf", options).unwrap();
/// ```
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    options: ExtractOptions,
) -> Result<ExtractionResult> {
    Extractor::new(options).parse_file(path)
}

/// Extract from a reader; the whole input is read first.
pub fn parse_reader<R: Read>(reader: R) -> Result<ExtractionResult> {
    Extractor::default().parse_reader(reader)
}

/// Extract from a file without blocking the async runtime.
///
/// The file is read with `tokio::fs` and extracted on the blocking pool.
#[cfg(feature = "async")]
pub async fn parse_file_async<P: AsRef<Path>>(path: P) -> Result<ExtractionResult> {
    parse_file_async_with_options(path, ExtractOptions::default()).await
}

/// Async extraction with custom options.
#[cfg(feature = "async")]
pub async fn parse_file_async_with_options<P: AsRef<Path>>(
    path: P,
    options: ExtractOptions,
) -> Result<ExtractionResult> {
    let path = path.as_ref();
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };
    if !metadata.is_file() {
        return Err(Error::NotAFile(path.to_path_buf()));
    }
    let data = tokio::fs::read(path).await?;
    tokio::task::spawn_blocking(move || Extractor::new(options).parse(&data))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Edge Case Tests ====================

    #[test]
    fn test_parse_bytes_empty_data() {
        // Empty data should return an error
        let data: [u8; 0] = [];
        let result = parse_bytes(&data);
        assert!(matches!(result, Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_parse_bytes_too_short() {
        let data = b"%PDF";
        let result = parse_bytes(data);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bytes_unknown_magic() {
        // Random bytes that don't match PDF format
        let data = [0xFF, 0xFE, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let result = parse_bytes(&data);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_reader_reads_everything() {
        let result = parse_reader(std::io::Cursor::new(b"garbage".to_vec()));
        assert!(matches!(result, Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_detect_format_empty_data() {
        let data: [u8; 0] = [];
        let result = detect_format_from_bytes(&data);
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_detect_valid_pdf_17() {
        let data = b"%PDF-1.7\n%test";
        let format = detect_format_from_bytes(data).unwrap();
        assert_eq!(format.version, "1.7");
    }

    #[test]
    fn test_is_pdf_bytes() {
        assert!(detect::is_pdf_bytes(b"%PDF-1.4\ntest"));
        assert!(!detect::is_pdf_bytes(b"Not a PDF file"));
        assert!(!detect::is_pdf_bytes(b""));
    }

    #[test]
    fn test_parse_file_not_found() {
        let result = parse_file("/nonexistent/path/to/file.pdf");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_parse_file_async_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_file_async(dir.path()).await;
        assert!(matches!(result, Err(Error::NotAFile(_))));
    }
}
