//! The PDF object model.

use std::collections::HashMap;

use crate::error::Result;

use super::filters::{self, Filter};

/// Object identifier: (object number, generation number).
pub type ObjectId = (u32, u16);

/// A PDF object.
///
/// References carry only the identifier; following them is the job of the
/// [`Resolver`](super::Resolver), so objects never point at each other
/// directly.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Vec<u8>),
    Name(String),
    Array(Vec<PdfObject>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl PdfObject {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(v) => Some(*v),
            PdfObject::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PdfObject::Integer(v) => Some(*v as f64),
            PdfObject::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            PdfObject::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PdfObject]> {
        match self {
            PdfObject::Array(v) => Some(v),
            _ => None,
        }
    }

    /// The dictionary of a dictionary or stream object.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            PdfObject::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    /// Human-readable variant name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            PdfObject::Null => "null",
            PdfObject::Boolean(_) => "boolean",
            PdfObject::Integer(_) | PdfObject::Real(_) => "number",
            PdfObject::String(_) => "string",
            PdfObject::Name(_) => "name",
            PdfObject::Array(_) => "array",
            PdfObject::Dictionary(_) => "dictionary",
            PdfObject::Stream(_) => "stream",
            PdfObject::Reference(_) => "reference",
        }
    }
}

/// A PDF dictionary keyed by name (without the leading slash).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(HashMap<String, PdfObject>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) -> Option<PdfObject> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PdfObject)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A direct name value.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PdfObject::as_name)
    }

    /// A direct integer value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PdfObject::as_i64)
    }

    /// The `/Type` name, if present.
    pub fn type_name(&self) -> Option<&str> {
        self.get_name("Type")
    }

    /// Fill in keys from `other` that this dictionary lacks.
    pub fn merge_missing(&mut self, other: &Dictionary) {
        for (key, value) in other.iter() {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

impl FromIterator<(String, PdfObject)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (String, PdfObject)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A stream: dictionary, undecoded payload and the decode-filter chain
/// named by `/Filter` and `/DecodeParms`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub raw: Vec<u8>,
    pub filters: Vec<Filter>,
}

impl Stream {
    pub fn new(dict: Dictionary, raw: Vec<u8>) -> Self {
        let filters = filters::chain_from_dict(&dict);
        Self { dict, raw, filters }
    }

    /// Apply the filter chain to the raw payload.
    pub fn decode(&self) -> Result<Vec<u8>> {
        filters::decode_chain(&self.raw, &self.filters)
    }
}
