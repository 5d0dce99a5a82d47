//! Page content: operator interpretation and text assembly.
//!
//! [`extract_runs`] executes a page's content streams and records the
//! text-showing operations; [`assemble`] decodes those runs into the
//! page's text.

mod assembler;
mod interpreter;

pub use assembler::{assemble, is_image_only};
pub use interpreter::{extract_runs, interpret_content, PageRuns, TextRun};
