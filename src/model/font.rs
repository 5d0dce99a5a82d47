//! Fonts: just enough of them to map character codes to text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::parser::{Dictionary, ObjectId, PdfObject, Resolver};

use super::cmap::CMap;
use super::encoding::{BaseEncoding, SimpleEncoding};

/// What the engine knows about one font resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    /// `/Subtype`: `Type1`, `TrueType`, `Type0`, ...
    pub subtype: String,
    pub base_font: Option<String>,
    /// Code table for simple fonts; `None` for composite fonts.
    pub encoding: Option<SimpleEncoding>,
    pub to_unicode: Option<CMap>,
    /// Type0 fonts use multi-byte codes.
    pub composite: bool,
}

impl FontDescriptor {
    /// Read a font dictionary. Broken optional parts (encoding, `ToUnicode`)
    /// are logged and left out.
    pub fn load(dict: &Dictionary, resolver: &Resolver<'_>) -> Self {
        let subtype = dict.get_name("Subtype").unwrap_or("Type1").to_string();
        let base_font = dict.get_name("BaseFont").map(str::to_string);
        let composite = subtype == "Type0";

        let to_unicode = match load_to_unicode(dict, resolver) {
            Ok(cmap) => cmap,
            Err(err) => {
                log::warn!(
                    "ToUnicode map of font {} is unreadable: {}",
                    base_font.as_deref().unwrap_or("?"),
                    err
                );
                None
            }
        };
        let encoding = if composite {
            None
        } else {
            Some(load_simple_encoding(dict, resolver))
        };

        Self {
            subtype,
            base_font,
            encoding,
            to_unicode,
            composite,
        }
    }

    /// Map shown bytes to text.
    ///
    /// `ToUnicode` wins, then the font's code table, then WinAnsi.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if self.composite {
            self.decode_composite(bytes)
        } else {
            self.decode_simple(bytes)
        }
    }

    fn decode_simple(&self, bytes: &[u8]) -> String {
        let fallback;
        let encoding = match &self.encoding {
            Some(encoding) => encoding,
            None => {
                fallback = SimpleEncoding::default();
                &fallback
            }
        };
        let mut out = String::with_capacity(bytes.len());
        for &byte in bytes {
            if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.lookup(u32::from(byte), 1)) {
                out.push_str(&text);
            } else if let Some(ch) = encoding.decode(byte) {
                out.push(ch);
            }
        }
        out
    }

    fn decode_composite(&self, bytes: &[u8]) -> String {
        let mut out = String::new();
        let mut i = 0;
        while i < bytes.len() {
            let rest = &bytes[i..];
            let len = self
                .to_unicode
                .as_ref()
                .filter(|m| m.has_codespaces())
                .and_then(|m| m.code_length(rest))
                .unwrap_or(2)
                .min(rest.len());
            let code = rest[..len]
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            match self.to_unicode.as_ref().and_then(|m| m.lookup(code, len)) {
                Some(text) => out.push_str(&text),
                // Without a map the best guess is Identity: code == Unicode.
                None => {
                    if let Some(ch) = char::from_u32(code).filter(|c| !c.is_control()) {
                        out.push(ch);
                    }
                }
            }
            i += len;
        }
        out
    }
}

fn load_to_unicode(dict: &Dictionary, resolver: &Resolver<'_>) -> Result<Option<CMap>> {
    let Some(object) = resolver.get(dict, "ToUnicode")? else {
        return Ok(None);
    };
    // `/ToUnicode /Identity-H` and similar names carry no mapping.
    let Some(stream) = object.as_stream() else {
        return Ok(None);
    };
    let cmap = CMap::parse(&stream.decode()?)?;
    Ok((!cmap.is_empty()).then_some(cmap))
}

fn load_simple_encoding(dict: &Dictionary, resolver: &Resolver<'_>) -> SimpleEncoding {
    let encoding = match resolver.get(dict, "Encoding") {
        Ok(Some(encoding)) => encoding,
        Ok(None) => return SimpleEncoding::default(),
        Err(err) => {
            log::debug!("Font encoding cannot be resolved: {}", err);
            return SimpleEncoding::default();
        }
    };

    match &*encoding {
        PdfObject::Name(name) => BaseEncoding::from_name(name)
            .map(SimpleEncoding::new)
            .unwrap_or_default(),
        PdfObject::Dictionary(enc) => {
            let mut table = enc
                .get_name("BaseEncoding")
                .and_then(BaseEncoding::from_name)
                .map(SimpleEncoding::new)
                .unwrap_or_default();
            if let Ok(Some(differences)) = resolver.get(enc, "Differences") {
                if let Some(items) = differences.as_array() {
                    table.apply_differences(items);
                }
            }
            table
        }
        _ => SimpleEncoding::default(),
    }
}

/// Fonts already loaded for a document, keyed by object id.
///
/// Shared across pages (and page workers), so every page that uses a font
/// object gets the same descriptor.
#[derive(Debug, Default)]
pub struct FontCache {
    fonts: Mutex<HashMap<ObjectId, Arc<FontDescriptor>>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The font at `id`, loading it on first use.
    pub fn get_or_load(&self, id: ObjectId, resolver: &Resolver<'_>) -> Result<Arc<FontDescriptor>> {
        if let Some(font) = self.lock().get(&id) {
            return Ok(Arc::clone(font));
        }
        let object = resolver.resolve(id)?;
        let Some(dict) = object.as_dict() else {
            return Err(Error::malformed(
                0,
                format!("font {} {} R is a {}, not a dictionary", id.0, id.1, object.type_name()),
            ));
        };
        let font = Arc::new(FontDescriptor::load(dict, resolver));
        Ok(Arc::clone(self.lock().entry(id).or_insert(font)))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectId, Arc<FontDescriptor>>> {
        self.fonts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_font(encoding: Option<SimpleEncoding>, to_unicode: Option<CMap>) -> FontDescriptor {
        FontDescriptor {
            subtype: "Type1".to_string(),
            base_font: Some("Helvetica".to_string()),
            encoding,
            to_unicode,
            composite: false,
        }
    }

    #[test]
    fn test_simple_font_uses_encoding() {
        let font = simple_font(Some(SimpleEncoding::new(BaseEncoding::WinAnsi)), None);
        assert_eq!(font.decode(b"Caf\xE9"), "Caf\u{00E9}");
    }

    #[test]
    fn test_to_unicode_wins_over_encoding() {
        let cmap = CMap::parse(b"beginbfchar <41> <0042> endbfchar").unwrap();
        let font = simple_font(Some(SimpleEncoding::default()), Some(cmap));
        assert_eq!(font.decode(b"AA C"), "BB C");
    }

    #[test]
    fn test_composite_font_two_byte_codes() {
        let cmap = CMap::parse(
            b"begincodespacerange <0000> <FFFF> endcodespacerange \
              beginbfrange <0024> <0026> <0041> endbfrange",
        )
        .unwrap();
        let font = FontDescriptor {
            subtype: "Type0".to_string(),
            base_font: None,
            encoding: None,
            to_unicode: Some(cmap),
            composite: true,
        };
        assert_eq!(font.decode(&[0x00, 0x24, 0x00, 0x26]), "AC");
    }

    #[test]
    fn test_composite_without_map_assumes_identity() {
        let font = FontDescriptor {
            subtype: "Type0".to_string(),
            base_font: None,
            encoding: None,
            to_unicode: None,
            composite: true,
        };
        assert_eq!(font.decode(&[0x00, 0x48, 0x00, 0x69, 0x00, 0x01]), "Hi");
    }
}
