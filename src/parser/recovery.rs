//! Rebuilding the object table by scanning the file.
//!
//! Used when the cross-reference data is missing, unreadable or points at
//! the wrong bytes. Every `N G obj` header in the buffer is recorded, later
//! definitions winning, and every `trailer` dictionary is merged with later
//! keys winning. Objects inside object streams are registered too, unless a
//! plain definition of the same number exists.

use std::sync::OnceLock;

use regex::bytes::Regex;

use super::lexer::{is_delimiter, is_whitespace};
use super::object::{Dictionary, PdfObject};
use super::object_stream::ObjectStream;
use super::reader::{self, ObjectReader};
use super::xref::{CrossReferenceTable, XrefEntry};

fn object_header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?-u)(\d{1,10})[\x00\t\n\x0C\r ]+(\d{1,5})[\x00\t\n\x0C\r ]+obj\b")
            .expect("static pattern compiles")
    })
}

/// Scan `buffer` for object definitions and trailers.
pub fn scan(buffer: &[u8]) -> CrossReferenceTable {
    let mut table = CrossReferenceTable::new();
    let mut headers = Vec::new();

    for caps in object_header_pattern().captures_iter(buffer) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let start = whole.start();
        if start > 0 && !is_whitespace(buffer[start - 1]) && !is_delimiter(buffer[start - 1]) {
            continue;
        }
        let (Some(num), Some(gen)) = (parse_number::<u32>(&caps[1]), parse_number::<u16>(&caps[2])) else {
            continue;
        };
        table.insert(
            num,
            XrefEntry::Offset {
                offset: start,
                generation: gen,
            },
        );
        headers.push((num, start));
    }
    log::debug!("Recovery scan found {} object headers", headers.len());

    let mut trailer = Dictionary::new();
    for pos in memchr::memmem::find_iter(buffer, b"trailer") {
        if let Ok(PdfObject::Dictionary(dict)) = ObjectReader::new(buffer, pos + b"trailer".len()).read_object() {
            let mut newer = dict;
            newer.merge_missing(&trailer);
            trailer = newer;
        }
    }
    trailer.remove("Prev");
    trailer.remove("XRefStm");
    *table.trailer_mut() = trailer;

    register_object_streams(buffer, &mut table, &headers);
    table
}

/// Add compressed entries for objects held in object streams.
fn register_object_streams(buffer: &[u8], table: &mut CrossReferenceTable, headers: &[(u32, usize)]) {
    let length_of = |id: (u32, u16)| -> Option<usize> {
        let Some(XrefEntry::Offset { offset, .. }) = table.get(id.0) else {
            return None;
        };
        let (_, value) = reader::read_indirect_object(buffer, *offset, &|_| None).ok()?;
        value.as_i64().and_then(|n| usize::try_from(n).ok())
    };

    let mut compressed = Vec::new();
    for (i, &(num, start)) in headers.iter().enumerate() {
        // Only the latest definition of each number counts.
        if !matches!(table.get(num), Some(XrefEntry::Offset { offset, .. }) if *offset == start) {
            continue;
        }
        let end = headers.get(i + 1).map_or(buffer.len(), |&(_, next)| next);
        if memchr::memmem::find(&buffer[start..end], b"/ObjStm").is_none() {
            continue;
        }
        let Ok((_, PdfObject::Stream(stream))) = reader::read_indirect_object(buffer, start, &length_of) else {
            continue;
        };
        match ObjectStream::parse(&stream) {
            Ok(objstm) => {
                for (index, id) in objstm.ids().enumerate() {
                    compressed.push((
                        id,
                        XrefEntry::Compressed {
                            stream_id: num,
                            index: index as u32,
                        },
                    ));
                }
            }
            Err(err) => log::debug!("Skipping unreadable object stream {}: {}", num, err),
        }
    }

    for (id, entry) in compressed {
        table.insert_if_absent(id, entry);
    }
}

fn parse_number<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
