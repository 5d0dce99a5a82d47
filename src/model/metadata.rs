//! Document information fields.

use crate::parser::{Dictionary, PdfObject, Resolver};

use super::document::Document;
use super::encoding::decode_text_string;
use super::result::Metadata;

/// Read title, author and creation date from the information dictionary.
/// `num_pages` is the flattened page count.
pub fn extract(document: &Document<'_>) -> Metadata {
    let info = document.info();
    let field = |key: &str| info.and_then(|info| text_field(info, key, document.resolver()));
    Metadata {
        title: field("Title"),
        author: field("Author"),
        creation_date: field("CreationDate"),
        num_pages: document.page_count(),
    }
}

/// A trimmed text value; blank values count as absent.
fn text_field(info: &Dictionary, key: &str, resolver: &Resolver<'_>) -> Option<String> {
    let value = resolver.get(info, key).ok()??;
    let text = match &*value {
        PdfObject::String(bytes) => decode_text_string(bytes),
        PdfObject::Name(name) => name.clone(),
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
