//! Document model for text extraction.
//!
//! [`Document`] is the flattened page tree on top of the parser; fonts,
//! encodings and `ToUnicode` maps turn shown bytes into text; the result
//! types are what callers get back.

mod cmap;
mod document;
pub mod encoding;
mod font;
pub mod metadata;
mod page;
mod result;

pub use cmap::CMap;
pub use document::Document;
pub use encoding::{decode_text_string, BaseEncoding, SimpleEncoding};
pub use font::{FontCache, FontDescriptor};
pub use page::{Page, Resources};
pub use result::{parse_pdf_date, ExtractionResult, Metadata, PageText};
