//! Cross-reference tables and streams.
//!
//! The newest section is found through `startxref`; `/Prev` links lead to
//! the sections of earlier revisions. Entries from newer sections shadow
//! older entries for the same object number.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

use super::lexer::{Lexer, Token};
use super::object::{Dictionary, PdfObject};
use super::reader::{self, ObjectReader};

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    Free,
    /// Byte offset of the `N G obj` header.
    Offset { offset: usize, generation: u16 },
    /// Object `index` inside the object stream `stream_id`.
    Compressed { stream_id: u32, index: u32 },
}

/// Object number to location, plus the merged trailer dictionary.
#[derive(Debug, Clone, Default)]
pub struct CrossReferenceTable {
    entries: HashMap<u32, XrefEntry>,
    trailer: Dictionary,
    /// Damage found in older sections that did not prevent building.
    pub(crate) warnings: Vec<String>,
}

impl CrossReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    /// Record an entry unless a newer section already defined `id`.
    pub fn insert_if_absent(&mut self, id: u32, entry: XrefEntry) {
        self.entries.entry(id).or_insert(entry);
    }

    /// Record an entry, replacing any existing one.
    pub fn insert(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &XrefEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_id(&self) -> Option<u32> {
        self.entries.keys().copied().max()
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }
}

/// Revisions form a chain; refuse to follow absurdly long ones.
const MAX_SECTIONS: usize = 256;

/// Build the table by following `startxref` and the `/Prev` chain.
///
/// Fails when the newest section cannot be read at all. Damage in older
/// sections stops the chain and is recorded in `warnings`.
pub fn build(buffer: &[u8], header_offset: usize) -> Result<CrossReferenceTable> {
    let start = find_startxref(buffer)?;
    let mut table = CrossReferenceTable::new();
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            table.warnings.push(format!(
                "Cross-reference chain loops back to offset {offset}; stopped following /Prev"
            ));
            break;
        }
        if visited.len() > MAX_SECTIONS {
            table.warnings.push("Cross-reference chain is too long; older revisions ignored".to_string());
            break;
        }

        let section = match read_section_with_shift(buffer, offset, header_offset) {
            Ok(section) => section,
            Err(err) if visited.len() == 1 => return Err(err),
            Err(err) => {
                log::warn!("Skipping damaged cross-reference section at {}: {}", offset, err);
                table
                    .warnings
                    .push(format!("Older cross-reference section at offset {offset} is damaged: {err}"));
                break;
            }
        };
        log::debug!(
            "Read cross-reference section at {} with {} entries",
            offset,
            section.entries.len()
        );

        for (id, entry) in section.entries {
            table.insert_if_absent(id, entry);
        }
        // Hybrid files: the classic section wins over its companion stream.
        if let Some(stream_offset) = section
            .trailer
            .get_i64("XRefStm")
            .and_then(|o| usize::try_from(o).ok())
        {
            match read_xref_stream(buffer, stream_offset) {
                Ok(hybrid) => {
                    for (id, entry) in hybrid.entries {
                        table.insert_if_absent(id, entry);
                    }
                }
                Err(err) => {
                    log::warn!("Cross-reference stream at {} is unreadable: {}", stream_offset, err);
                    table.warnings.push(format!(
                        "Cross-reference stream at offset {stream_offset} is unreadable: {err}"
                    ));
                }
            }
        }

        next = section
            .trailer
            .get_i64("Prev")
            .and_then(|prev| usize::try_from(prev).ok());
        table.trailer.merge_missing(&section.trailer);
    }

    // Every usable table locates at least one object by offset.
    if !table.iter().any(|(_, entry)| matches!(entry, XrefEntry::Offset { .. })) {
        return Err(Error::malformed(start, "cross-reference data locates no objects"));
    }

    // The newest trailer's /Prev is meaningless after merging.
    table.trailer.remove("Prev");
    Ok(table)
}

/// Locate the offset named by the last `startxref` keyword.
pub fn find_startxref(buffer: &[u8]) -> Result<usize> {
    let pos = memchr::memmem::rfind(buffer, b"startxref")
        .ok_or_else(|| Error::malformed(buffer.len(), "no startxref keyword"))?;
    let mut lexer = Lexer::at(buffer, pos + b"startxref".len());
    match lexer.next_token()? {
        Some(Token::Integer(offset)) if offset >= 0 && (offset as usize) < buffer.len() => {
            Ok(offset as usize)
        }
        _ => Err(Error::malformed(pos, "startxref is not followed by a valid offset")),
    }
}

struct Section {
    entries: Vec<(u32, XrefEntry)>,
    trailer: Dictionary,
}

/// Offsets are sometimes relative to the `%PDF` header rather than to the
/// start of the file; retry with the shift applied.
fn read_section_with_shift(buffer: &[u8], offset: usize, header_offset: usize) -> Result<Section> {
    match read_section(buffer, offset) {
        Err(err) if header_offset > 0 => read_section(buffer, offset + header_offset).map_err(|_| err),
        result => result,
    }
}

fn read_section(buffer: &[u8], offset: usize) -> Result<Section> {
    let mut lexer = Lexer::at(buffer, offset);
    match lexer.peek_token()? {
        Some(token) if token.is_keyword("xref") => {
            lexer.next_token()?;
            read_classic_section(buffer, lexer)
        }
        Some(Token::Integer(_)) => read_xref_stream(buffer, offset),
        _ => Err(Error::malformed(offset, "startxref does not point at a cross-reference section")),
    }
}

fn read_classic_section(buffer: &[u8], mut lexer: Lexer<'_>) -> Result<Section> {
    let mut entries = Vec::new();
    loop {
        let at = lexer.position();
        match lexer.next_token()? {
            Some(token) if token.is_keyword("trailer") => break,
            Some(Token::Integer(first)) => {
                let count = match lexer.next_token()? {
                    Some(Token::Integer(count)) if count >= 0 => count,
                    _ => return Err(Error::malformed(at, "bad cross-reference subsection header")),
                };
                let first = u32::try_from(first)
                    .map_err(|_| Error::malformed(at, "negative subsection start"))?;
                for i in 0..count {
                    let entry_at = lexer.position();
                    let (field1, field2, kind) =
                        (lexer.next_token()?, lexer.next_token()?, lexer.next_token()?);
                    let entry = match (field1, field2, kind) {
                        (Some(Token::Integer(off)), Some(Token::Integer(gen)), Some(kw))
                            if kw.is_keyword("n") =>
                        {
                            XrefEntry::Offset {
                                offset: usize::try_from(off).unwrap_or(usize::MAX),
                                generation: u16::try_from(gen).unwrap_or(u16::MAX),
                            }
                        }
                        (Some(Token::Integer(_)), Some(Token::Integer(_)), Some(kw))
                            if kw.is_keyword("f") =>
                        {
                            XrefEntry::Free
                        }
                        _ => return Err(Error::malformed(entry_at, "bad cross-reference entry")),
                    };
                    let id = u32::try_from(i)
                        .ok()
                        .and_then(|i| first.checked_add(i))
                        .ok_or_else(|| Error::malformed(entry_at, "subsection runs past the largest object number"))?;
                    entries.push((id, entry));
                }
            }
            _ => return Err(Error::malformed(at, "expected subsection or trailer")),
        }
    }

    let trailer = match ObjectReader::new(buffer, lexer.position()).read_object()? {
        PdfObject::Dictionary(dict) => dict,
        other => {
            return Err(Error::malformed(
                lexer.position(),
                format!("trailer is a {}, not a dictionary", other.type_name()),
            ))
        }
    };
    Ok(Section { entries, trailer })
}

/// Parse a `/Type /XRef` stream at `offset`.
fn read_xref_stream(buffer: &[u8], offset: usize) -> Result<Section> {
    let (_, object) = reader::read_indirect_object(buffer, offset, &|_| None)?;
    let stream = match object {
        PdfObject::Stream(stream) if stream.dict.type_name() == Some("XRef") => stream,
        other => {
            return Err(Error::malformed(
                offset,
                format!("expected a cross-reference stream, found a {}", other.type_name()),
            ))
        }
    };

    let widths: Vec<usize> = stream
        .dict
        .get("W")
        .and_then(PdfObject::as_array)
        .map(|w| w.iter().map(|v| v.as_i64().unwrap_or(0).clamp(0, 8) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 {
        return Err(Error::malformed(offset, "cross-reference stream /W must have three entries"));
    }

    let size = stream.dict.get_i64("Size").unwrap_or(0).max(0);
    let ranges: Vec<(i64, i64)> = match stream.dict.get("Index").and_then(PdfObject::as_array) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| Some((pair.first()?.as_i64()?, pair.get(1)?.as_i64()?)))
            .collect(),
        None => vec![(0, size)],
    };

    let data = stream.decode()?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::malformed(offset, "cross-reference stream rows are empty"));
    }
    let mut rows = data.chunks_exact(row_len);
    let mut entries = Vec::new();

    'ranges: for (first, count) in ranges {
        for i in 0..count.max(0) {
            let Some(row) = rows.next() else {
                break 'ranges;
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { be_uint(f1) };
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::Offset {
                    offset: usize::try_from(be_uint(f2)).unwrap_or(usize::MAX),
                    generation: u16::try_from(be_uint(f3)).unwrap_or(u16::MAX),
                },
                2 => XrefEntry::Compressed {
                    stream_id: u32::try_from(be_uint(f2)).unwrap_or(u32::MAX),
                    index: u32::try_from(be_uint(f3)).unwrap_or(u32::MAX),
                },
                _ => continue,
            };
            let Some(id) = first.checked_add(i).and_then(|n| u32::try_from(n).ok()) else {
                continue;
            };
            entries.push((id, entry));
        }
    }

    let mut trailer = stream.dict;
    for key in ["Filter", "DecodeParms", "Length", "W", "Index", "Type"] {
        trailer.remove(key);
    }
    Ok(Section { entries, trailer })
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
