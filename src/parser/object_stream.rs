//! Compressed object streams (`/Type /ObjStm`).

use crate::error::{Error, Result};

use super::lexer::{Lexer, Token};
use super::object::{PdfObject, Stream};
use super::reader::ObjectReader;

/// A decoded object stream: its payload plus the `(object number, offset)`
/// pairs from the stream header.
#[derive(Debug)]
pub struct ObjectStream {
    data: Vec<u8>,
    first: usize,
    entries: Vec<(u32, usize)>,
}

impl ObjectStream {
    pub fn parse(stream: &Stream) -> Result<Self> {
        if stream.dict.type_name() != Some("ObjStm") {
            return Err(Error::malformed(0, "not an object stream"));
        }
        let first = stream
            .dict
            .get_i64("First")
            .and_then(|f| usize::try_from(f).ok())
            .ok_or_else(|| Error::malformed(0, "object stream has no /First"))?;
        let data = stream.decode()?;
        let header = &data[..first.min(data.len())];

        // Each header pair takes at least four bytes ("1 0 ").
        let count = stream
            .dict
            .get_i64("N")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
            .min(header.len() / 2);
        let mut lexer = Lexer::new(header);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            match (lexer.next_token()?, lexer.next_token()?) {
                (Some(Token::Integer(num)), Some(Token::Integer(off))) => {
                    let (Ok(num), Ok(off)) = (u32::try_from(num), usize::try_from(off)) else {
                        continue;
                    };
                    entries.push((num, off));
                }
                _ => break,
            }
        }
        Ok(Self { data, first, entries })
    }

    /// Object numbers in header order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|(num, _)| *num)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the object at `index` in the header.
    pub fn object_at(&self, index: u32) -> Result<(u32, PdfObject)> {
        let &(num, offset) = self
            .entries
            .get(index as usize)
            .ok_or_else(|| Error::malformed(0, format!("object stream has no index {index}")))?;
        let pos = self.first.saturating_add(offset);
        if pos >= self.data.len() {
            return Err(Error::malformed(pos, "object stream offset out of bounds"));
        }
        let object = ObjectReader::new(&self.data, pos).read_object()?;
        Ok((num, object))
    }

    /// Parse the object numbered `num`, wherever the header places it.
    pub fn object_by_id(&self, num: u32) -> Result<PdfObject> {
        let index = self
            .entries
            .iter()
            .position(|(n, _)| *n == num)
            .ok_or_else(|| Error::malformed(0, format!("object {num} is not in this object stream")))?;
        self.object_at(index as u32).map(|(_, object)| object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::object::Dictionary;

    fn object_stream(header: &str, body: &str) -> Stream {
        let mut dict = Dictionary::new();
        dict.insert("Type", PdfObject::Name("ObjStm".into()));
        dict.insert("N", PdfObject::Integer(2));
        dict.insert("First", PdfObject::Integer(header.len() as i64));
        Stream::new(dict, format!("{header}{body}").into_bytes())
    }

    #[test]
    fn test_parse_object_stream() {
        let body = "<< /Type /Font >> (hello)";
        let stream = object_stream("10 0 11 18 ", body);
        let objstm = ObjectStream::parse(&stream).unwrap();
        assert_eq!(objstm.ids().collect::<Vec<_>>(), vec![10, 11]);

        let (num, font) = objstm.object_at(0).unwrap();
        assert_eq!(num, 10);
        assert_eq!(font.as_dict().and_then(|d| d.type_name()), Some("Font"));
        assert_eq!(objstm.object_by_id(11).unwrap(), PdfObject::String(b"hello".to_vec()));
    }

    #[test]
    fn test_missing_index_is_an_error() {
        let stream = object_stream("10 0 11 18 ", "<< /Type /Font >> (hello)");
        let objstm = ObjectStream::parse(&stream).unwrap();
        assert!(objstm.object_at(5).is_err());
        assert!(objstm.object_by_id(99).is_err());
    }

    #[test]
    fn test_huge_count_is_bounded_by_header() {
        let mut stream = object_stream("10 0 11 18 ", "<< /Type /Font >> (hello)");
        stream.dict.insert("N", PdfObject::Integer(4_000_000_000_000_000_000));
        let objstm = ObjectStream::parse(&stream).unwrap();
        assert_eq!(objstm.len(), 2);

        stream.dict.insert("N", PdfObject::Integer(-3));
        assert!(ObjectStream::parse(&stream).unwrap().is_empty());
    }

    #[test]
    fn test_first_beyond_data() {
        let mut stream = object_stream("10 0 11 18 ", "<< /Type /Font >> (hello)");
        stream.dict.insert("First", PdfObject::Integer(i64::MAX));
        let objstm = ObjectStream::parse(&stream).unwrap();
        assert_eq!(objstm.len(), 2);
        assert!(objstm.object_at(0).is_err());
    }

    #[test]
    fn test_rejects_other_streams() {
        let stream = Stream::new(Dictionary::new(), b"BT ET".to_vec());
        assert!(ObjectStream::parse(&stream).is_err());
    }
}
