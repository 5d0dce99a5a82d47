//! JSON rendering for extraction results.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{ExtractionResult, Metadata};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Result without its page texts.
#[derive(Serialize)]
struct Summary<'a> {
    metadata: &'a Metadata,
    warnings: &'a [String],
}

/// Convert a result to JSON: `{"metadata", "pages", "warnings"}`.
pub fn to_json(result: &ExtractionResult, format: JsonFormat) -> Result<String> {
    serialize(result, format)
}

/// Convert a result to JSON with the `pages` array left out.
pub fn to_json_without_pages(result: &ExtractionResult, format: JsonFormat) -> Result<String> {
    let summary = Summary {
        metadata: &result.metadata,
        warnings: &result.warnings,
    };
    serialize(&summary, format)
}

fn serialize<T: Serialize>(value: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}
