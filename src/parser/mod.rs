//! PDF parsing module.
//!
//! Bottom-up: [`lexer`] tokenizes bytes, [`reader`] builds objects,
//! [`xref`] and [`recovery`] locate them and [`Resolver`] hands them out
//! on demand.

pub mod filters;
pub mod lexer;
mod object;
mod object_stream;
pub mod reader;
pub mod recovery;
mod resolver;
pub mod xref;

pub use filters::{Filter, FilterKind};
pub use object::{Dictionary, ObjectId, PdfObject, Stream};
pub use object_stream::ObjectStream;
pub use reader::{read_object, ObjectReader};
pub use resolver::{Resolved, Resolver};
pub use xref::{CrossReferenceTable, XrefEntry};
