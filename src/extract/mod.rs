//! The extraction pipeline.
//!
//! resolver → document → metadata → per-page interpretation and assembly →
//! aggregate warnings. Only a missing catalog fails the whole call; every
//! lesser problem becomes a warning in the result.

mod options;

pub use options::ExtractOptions;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use rayon::prelude::*;

use crate::content;
use crate::error::{Error, Result};
use crate::model::{metadata, Document, ExtractionResult, Page, PageText};
use crate::parser::Resolver;

/// Warning emitted when no page has any text.
pub const SCANNED_DOCUMENT_WARNING: &str = "This PDF appears to be a scanned/image-only document. \
     No text could be extracted. Consider using an OCR tool (e.g. ocrmypdf or Tesseract) to convert it first.";

/// Runs extractions with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract text and metadata from a complete PDF held in memory.
    pub fn parse(&self, data: &[u8]) -> Result<ExtractionResult> {
        let resolver = Resolver::new(data, &self.options)?;
        let document = Document::build(resolver);
        let metadata = metadata::extract(&document);
        log::debug!("Extracting {} page(s)", document.page_count());

        let extracted: Vec<(PageText, Vec<String>)> = if self.options.parallel {
            document
                .pages()
                .par_iter()
                .map(|page| self.extract_page(&document, page))
                .collect()
        } else {
            document
                .pages()
                .iter()
                .map(|page| self.extract_page(&document, page))
                .collect()
        };

        let mut warnings = document.warnings().to_vec();
        let mut pages = Vec::with_capacity(extracted.len());
        for (page, mut page_warnings) in extracted {
            warnings.append(&mut page_warnings);
            pages.push(page);
        }

        let image_only = pages
            .iter()
            .filter(|page| content::is_image_only(&page.text))
            .count();
        if let Some(warning) = image_only_warning(image_only, pages.len()) {
            warnings.push(warning);
        }

        Ok(ExtractionResult {
            metadata,
            pages,
            warnings: dedup(warnings),
        })
    }

    /// Read and extract the file at `path`.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let data = read_file(path)?;
        self.parse(&data)
    }

    /// Read `reader` to the end and extract it.
    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<ExtractionResult> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.parse(&data)
    }

    fn extract_page(&self, document: &Document<'_>, page: &Page) -> (PageText, Vec<String>) {
        let runs = content::extract_runs(document, page, self.options.max_form_depth);
        let text = content::assemble(&runs.runs);
        (
            PageText {
                page: page.index,
                text,
            },
            runs.warnings,
        )
    }
}

/// Read a whole file, telling a missing path apart from one that is not a
/// regular file.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };
    if !metadata.is_file() {
        return Err(Error::NotAFile(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

/// The aggregate warning for `image_only` blank pages out of `total`.
pub fn image_only_warning(image_only: usize, total: usize) -> Option<String> {
    if total == 0 || image_only == 0 {
        None
    } else if image_only == total {
        Some(SCANNED_DOCUMENT_WARNING.to_string())
    } else {
        Some(format!(
            "{image_only} of {total} page(s) appear to be image-only and yielded no extractable text."
        ))
    }
}

/// Drop repeated warnings, keeping the first occurrence.
fn dedup(warnings: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    warnings
        .into_iter()
        .filter(|warning| seen.insert(warning.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_only_warning() {
        assert_eq!(image_only_warning(0, 0), None);
        assert_eq!(image_only_warning(0, 5), None);
        let all = image_only_warning(3, 3).unwrap();
        assert!(all.to_lowercase().contains("scanned"));
        assert!(all.contains("OCR"));
        let some = image_only_warning(1, 4).unwrap();
        assert!(some.starts_with("1 of 4 page(s)"));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let warnings = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(dedup(warnings), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_read_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_file(dir.path()), Err(Error::NotAFile(_))));
        let missing = dir.path().join("missing.pdf");
        assert!(matches!(read_file(&missing), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let err = Extractor::default().parse(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
    }
}
