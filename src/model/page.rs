//! Page-level types.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::parser::{Dictionary, ObjectId, PdfObject, Resolver};

use super::font::{FontCache, FontDescriptor};

/// US Letter, used when no `/MediaBox` is found up the tree.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A single page in the document.
#[derive(Debug, Clone)]
pub struct Page {
    /// Page number (1-indexed), in page-tree order.
    pub index: u32,
    /// Object id of the page dictionary, when it is indirect.
    pub id: Option<ObjectId>,
    pub media_box: [f64; 4],
    pub resources: Resources,
    /// Content streams, concatenated before interpretation.
    pub contents: Vec<ObjectId>,
    /// Problems met while building the page (unresolvable fonts, ...).
    pub warnings: Vec<String>,
}

impl Page {
    /// Page width in points.
    pub fn width(&self) -> f64 {
        (self.media_box[2] - self.media_box[0]).abs()
    }

    /// Page height in points.
    pub fn height(&self) -> f64 {
        (self.media_box[3] - self.media_box[1]).abs()
    }

    /// Whether the page has no content streams at all.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// The parts of a resource dictionary text extraction needs.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    /// Font resource name (without slash) to font.
    pub fonts: BTreeMap<String, Arc<FontDescriptor>>,
    /// XObject resource name to object id.
    pub xobjects: BTreeMap<String, ObjectId>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `/Font` and `/XObject` from a resource dictionary.
    ///
    /// Entries that cannot be resolved are left out and described in the
    /// returned warnings.
    pub fn load(dict: &Dictionary, resolver: &Resolver<'_>, cache: &FontCache) -> (Self, Vec<String>) {
        let mut resources = Resources::new();
        let mut warnings = Vec::new();

        match resolver.get_dict(dict, "Font") {
            Ok(Some(fonts)) => {
                for (name, value) in fonts.as_dict().into_iter().flat_map(|d| d.iter()) {
                    let font = match value {
                        PdfObject::Reference(id) => cache.get_or_load(*id, resolver),
                        PdfObject::Dictionary(font) => Ok(Arc::new(FontDescriptor::load(font, resolver))),
                        other => {
                            log::debug!("Font /{} is a {}", name, other.type_name());
                            continue;
                        }
                    };
                    match font {
                        Ok(font) => {
                            resources.fonts.insert(name.clone(), font);
                        }
                        Err(err) => {
                            log::warn!("Font /{} cannot be loaded: {}", name, err);
                            warnings.push(format!("Font /{name} cannot be loaded: {err}"));
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(err) => warnings.push(format!("Font resources cannot be resolved: {err}")),
        }

        match resolver.get_dict(dict, "XObject") {
            Ok(Some(xobjects)) => {
                for (name, value) in xobjects.as_dict().into_iter().flat_map(|d| d.iter()) {
                    if let Some(id) = value.as_reference() {
                        resources.xobjects.insert(name.clone(), id);
                    }
                }
            }
            Ok(None) => {}
            Err(err) => warnings.push(format!("XObject resources cannot be resolved: {err}")),
        }

        (resources, warnings)
    }

    pub fn font(&self, name: &str) -> Option<&Arc<FontDescriptor>> {
        self.fonts.get(name)
    }

    pub fn xobject(&self, name: &str) -> Option<ObjectId> {
        self.xobjects.get(name).copied()
    }
}

/// Parse a rectangle array, normalizing it to `[llx, lly, urx, ury]`.
pub fn parse_rect(object: &PdfObject) -> Option<[f64; 4]> {
    let values: Vec<f64> = object.as_array()?.iter().filter_map(PdfObject::as_f64).collect();
    let [x0, y0, x1, y1] = <[f64; 4]>::try_from(values).ok()?;
    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}
