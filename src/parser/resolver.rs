//! Reference resolution over an arena of lazily parsed objects.
//!
//! The resolver owns the cross-reference table and one memo slot per table
//! entry. An object is parsed the first time it is asked for and shared via
//! `Arc` afterwards; indirect references stay plain ids, so the object graph
//! never holds pointers into itself.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use crate::detect;
use crate::error::{Error, Result};
use crate::extract::ExtractOptions;

use super::object::{Dictionary, ObjectId, PdfObject};
use super::object_stream::ObjectStream;
use super::reader;
use super::recovery;
use super::xref::{self, CrossReferenceTable, XrefEntry};

/// Bound on reference chains and nested length/object-stream lookups.
const MAX_RESOLVE_DEPTH: usize = 16;

type Slot<T> = OnceLock<Option<Arc<T>>>;

/// An object that is either borrowed from its container or shared from
/// the arena.
#[derive(Debug, Clone)]
pub enum Resolved<'o> {
    Borrowed(&'o PdfObject),
    Shared(Arc<PdfObject>),
}

impl Deref for Resolved<'_> {
    type Target = PdfObject;

    fn deref(&self) -> &PdfObject {
        match self {
            Resolved::Borrowed(object) => object,
            Resolved::Shared(object) => object,
        }
    }
}

/// Resolves indirect references for one document.
pub struct Resolver<'a> {
    buffer: &'a [u8],
    table: CrossReferenceTable,
    slots: HashMap<u32, Slot<PdfObject>>,
    object_streams: HashMap<u32, Slot<ObjectStream>>,
    catalog: Dictionary,
    warnings: Vec<String>,
}

impl<'a> Resolver<'a> {
    /// Build the object table for `buffer` and locate the catalog.
    ///
    /// Damaged cross-reference data falls back to a recovery scan and is
    /// reported in [`warnings`](Self::warnings). Fails with
    /// [`Error::InvalidDocument`] only when no catalog can be found.
    pub fn new(buffer: &'a [u8], options: &ExtractOptions) -> Result<Self> {
        let mut warnings = Vec::new();

        let header_offset = match detect::detect_format_from_bytes(buffer) {
            Ok(format) => {
                log::debug!("PDF version {} (header at {})", format.version, format.header_offset);
                format.header_offset
            }
            Err(_) => {
                log::warn!("No %PDF header found");
                warnings.push("File does not start with a %PDF header; parsing it anyway".to_string());
                0
            }
        };

        let table = match xref::build(buffer, header_offset) {
            Ok(mut table) => {
                warnings.append(&mut table.warnings);
                validate(buffer, table, header_offset, &mut warnings)
            }
            Err(err) => {
                log::warn!("Cross-reference data unusable ({}); scanning the file", err);
                warnings.push(format!(
                    "Cross-reference data is unreadable ({err}); object table rebuilt by scanning the file"
                ));
                recovery::scan(buffer)
            }
        };
        if table.is_empty() {
            return Err(Error::InvalidDocument("no objects found".to_string()));
        }

        if table.trailer().contains_key("Encrypt") {
            log::warn!("Document is encrypted");
            warnings.push(
                "Document is encrypted; decryption is not supported and extracted text may be unreadable"
                    .to_string(),
            );
        }

        if table.max_id().is_some_and(|max| max >= options.max_objects) {
            log::warn!("Ignoring object numbers at or above {}", options.max_objects);
        }
        // One slot per entry actually in the table; sparse numbering stays cheap.
        let slots = table
            .iter()
            .filter(|(id, entry)| *id < options.max_objects && !matches!(entry, XrefEntry::Free))
            .map(|(id, _)| (id, OnceLock::new()))
            .collect();
        let object_streams = table
            .iter()
            .filter_map(|(_, entry)| match entry {
                XrefEntry::Compressed { stream_id, .. } => Some(*stream_id),
                _ => None,
            })
            .map(|id| (id, OnceLock::new()))
            .collect();

        let mut resolver = Self {
            buffer,
            table,
            slots,
            object_streams,
            catalog: Dictionary::new(),
            warnings,
        };
        resolver.catalog = resolver.locate_catalog()?;
        log::debug!("Resolver ready with {} table entries", resolver.table.len());
        Ok(resolver)
    }

    pub fn trailer(&self) -> &Dictionary {
        self.table.trailer()
    }

    pub fn catalog(&self) -> &Dictionary {
        &self.catalog
    }

    /// Structural damage found while building the resolver.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of objects known to the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The object numbered `id`, parsed at most once.
    pub fn resolve(&self, id: ObjectId) -> Result<Arc<PdfObject>> {
        self.resolve_at_depth(id, 0)
    }

    /// Follow `object` if it is a reference; borrow it otherwise.
    pub fn follow<'o>(&self, object: &'o PdfObject) -> Result<Resolved<'o>> {
        let PdfObject::Reference(mut id) = object else {
            return Ok(Resolved::Borrowed(object));
        };
        for _ in 0..MAX_RESOLVE_DEPTH {
            let target = self.resolve(id)?;
            match target.as_reference() {
                Some(next) => id = next,
                None => return Ok(Resolved::Shared(target)),
            }
        }
        Err(Error::UnresolvableReference {
            id: id.0,
            generation: id.1,
        })
    }

    /// Value of `key` in `dict`, following a reference. `Ok(None)` when the
    /// key is absent or null.
    pub fn get<'o>(&self, dict: &'o Dictionary, key: &str) -> Result<Option<Resolved<'o>>> {
        match dict.get(key) {
            None | Some(PdfObject::Null) => Ok(None),
            Some(value) => self.follow(value).map(Some),
        }
    }

    /// Dictionary-valued `key` of `dict`, following a reference.
    pub fn get_dict<'o>(&self, dict: &'o Dictionary, key: &str) -> Result<Option<Resolved<'o>>> {
        Ok(self.get(dict, key)?.filter(|value| value.as_dict().is_some()))
    }

    fn resolve_at_depth(&self, id: ObjectId, depth: usize) -> Result<Arc<PdfObject>> {
        let unresolvable = || Error::UnresolvableReference {
            id: id.0,
            generation: id.1,
        };
        let slot = self.slots.get(&id.0).ok_or_else(unresolvable)?;
        if let Some(cached) = slot.get() {
            return cached.clone().ok_or_else(unresolvable);
        }
        if depth > MAX_RESOLVE_DEPTH {
            return Err(unresolvable());
        }

        let loaded = match self.load(id, depth) {
            Ok(object) => Some(Arc::new(object)),
            Err(err) => {
                log::debug!("Object {} {} failed to load: {}", id.0, id.1, err);
                None
            }
        };
        // Another thread may have won the race; either value is equivalent.
        let _ = slot.set(loaded);
        slot.get().cloned().flatten().ok_or_else(unresolvable)
    }

    fn load(&self, id: ObjectId, depth: usize) -> Result<PdfObject> {
        match self.table.get(id.0) {
            Some(XrefEntry::Offset { offset, generation }) => {
                if *generation != id.1 {
                    log::debug!(
                        "Reference {} {} R resolved to generation {}",
                        id.0,
                        id.1,
                        generation
                    );
                }
                if *offset >= self.buffer.len() {
                    return Err(Error::malformed(*offset, "offset beyond end of file"));
                }
                let lengths = |length_id: ObjectId| -> Option<usize> {
                    if length_id.0 == id.0 {
                        return None;
                    }
                    let value = self.resolve_at_depth(length_id, depth + 1).ok()?;
                    value.as_i64().and_then(|n| usize::try_from(n).ok())
                };
                let (_, object) = reader::read_indirect_object(self.buffer, *offset, &lengths)?;
                Ok(object)
            }
            Some(XrefEntry::Compressed { stream_id, .. }) => {
                let objstm = self.object_stream(*stream_id, depth)?;
                objstm.object_by_id(id.0)
            }
            Some(XrefEntry::Free) | None => Err(Error::UnresolvableReference {
                id: id.0,
                generation: id.1,
            }),
        }
    }

    fn object_stream(&self, stream_id: u32, depth: usize) -> Result<Arc<ObjectStream>> {
        let unresolvable = || Error::UnresolvableReference {
            id: stream_id,
            generation: 0,
        };
        let slot = self.object_streams.get(&stream_id).ok_or_else(unresolvable)?;
        if let Some(cached) = slot.get() {
            return cached.clone().ok_or_else(unresolvable);
        }

        let parsed = self
            .resolve_at_depth((stream_id, 0), depth + 1)
            .and_then(|object| match object.as_stream() {
                Some(stream) => ObjectStream::parse(stream),
                None => Err(Error::malformed(0, format!("object {stream_id} is not a stream"))),
            });
        let parsed = match parsed {
            Ok(objstm) => Some(Arc::new(objstm)),
            Err(err) => {
                log::debug!("Object stream {} is unusable: {}", stream_id, err);
                None
            }
        };
        let _ = slot.set(parsed);
        slot.get().cloned().flatten().ok_or_else(unresolvable)
    }

    fn locate_catalog(&mut self) -> Result<Dictionary> {
        if let Some(root) = self.trailer().get("Root") {
            match self.follow(root) {
                Ok(object) => match object.as_dict() {
                    Some(dict) if is_catalog(dict) => return Ok(dict.clone()),
                    _ => log::warn!("Trailer /Root is a {}, not a catalog", object.type_name()),
                },
                Err(err) => log::warn!("Trailer /Root cannot be resolved: {}", err),
            }
        }

        // Later objects shadow earlier ones, so prefer the highest number.
        let mut ids: Vec<u32> = self
            .table
            .iter()
            .filter(|(_, entry)| !matches!(entry, XrefEntry::Free))
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        for id in ids {
            let Ok(object) = self.resolve((id, 0)) else {
                continue;
            };
            if let Some(dict) = object.as_dict().filter(|d| d.type_name() == Some("Catalog")) {
                self.warnings.push(format!(
                    "Trailer has no usable /Root; using catalog object {id}"
                ));
                return Ok(dict.clone());
            }
        }
        Err(Error::InvalidDocument("no document catalog found".to_string()))
    }
}

fn is_catalog(dict: &Dictionary) -> bool {
    dict.type_name() == Some("Catalog") || dict.contains_key("Pages")
}

/// Check every in-use offset against the `N G obj` header it should point
/// at. A table with bad offsets is replaced by a recovery scan, keeping the
/// original trailer keys and compressed entries.
fn validate(
    buffer: &[u8],
    mut table: CrossReferenceTable,
    header_offset: usize,
    warnings: &mut Vec<String>,
) -> CrossReferenceTable {
    let mut bad = 0usize;
    let mut shifted = Vec::new();
    for (id, entry) in table.iter() {
        let XrefEntry::Offset { offset, generation } = *entry else {
            continue;
        };
        if id == 0 {
            continue;
        }
        let points_at = |at: usize| reader::read_object_header(buffer, at).is_some_and(|(num, _)| num == id);
        if points_at(offset) {
            continue;
        }
        if header_offset > 0 && points_at(offset + header_offset) {
            shifted.push((
                id,
                XrefEntry::Offset {
                    offset: offset + header_offset,
                    generation,
                },
            ));
            continue;
        }
        bad += 1;
    }
    for (id, entry) in shifted {
        table.insert(id, entry);
    }
    if bad == 0 {
        return table;
    }

    log::warn!("{} cross-reference entries point at the wrong bytes; scanning the file", bad);
    warnings.push(format!(
        "Cross-reference table is damaged ({bad} bad offset(s)); object table rebuilt by scanning the file"
    ));
    let mut scanned = recovery::scan(buffer);
    for (id, entry) in table.iter() {
        if let XrefEntry::Compressed { .. } = entry {
            scanned.insert_if_absent(id, *entry);
        }
    }
    let mut trailer = table.trailer().clone();
    trailer.merge_missing(scanned.trailer());
    *scanned.trailer_mut() = trailer;
    scanned
}
