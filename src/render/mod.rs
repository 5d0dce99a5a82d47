//! Rendering of extraction results.

mod json;

pub use json::{to_json, to_json_without_pages, JsonFormat};
