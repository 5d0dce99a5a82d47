//! Object grammar: turns tokens into [`PdfObject`]s.

use crate::error::{Error, Result};

use super::lexer::{Lexer, Token};
use super::object::{Dictionary, ObjectId, PdfObject, Stream};

/// Resolves an indirect `/Length` to a byte count.
pub type LengthLookup<'l> = &'l dyn Fn(ObjectId) -> Option<usize>;

const MAX_NESTING: usize = 256;

/// Which grammar the reader accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    /// File body: indirect references and streams are recognized.
    File,
    /// Content-stream operands: plain values only.
    Content,
}

/// Recursive-descent reader over a [`Lexer`].
pub struct ObjectReader<'a, 'l> {
    lexer: Lexer<'a>,
    syntax: Syntax,
    lengths: Option<LengthLookup<'l>>,
}

impl<'a, 'l> ObjectReader<'a, 'l> {
    /// Reader for file-body objects starting at `offset`.
    pub fn new(buffer: &'a [u8], offset: usize) -> Self {
        Self {
            lexer: Lexer::at(buffer, offset),
            syntax: Syntax::File,
            lengths: None,
        }
    }

    /// Reader for content-stream operands.
    pub fn content(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            syntax: Syntax::Content,
            lengths: None,
        }
    }

    /// Use `lookup` for streams whose `/Length` is an indirect reference.
    pub fn with_lengths(mut self, lookup: LengthLookup<'l>) -> Self {
        self.lengths = Some(lookup);
        self
    }

    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Next top-level token. Content streams drop stray `]` and `>>`.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.lexer.next_token()? {
                Some(Token::ArrayEnd | Token::DictEnd) if self.syntax == Syntax::Content => continue,
                token => return Ok(token),
            }
        }
    }

    /// Read one complete object.
    pub fn read_object(&mut self) -> Result<PdfObject> {
        let start = self.lexer.position();
        match self.lexer.next_token()? {
            Some(token) => self.parse(token, start, 0),
            None => Err(Error::malformed(start, "unexpected end of data")),
        }
    }

    /// Finish parsing an object whose first token was already read.
    pub fn parse_from(&mut self, token: Token) -> Result<PdfObject> {
        let start = self.lexer.position();
        self.parse(token, start, 0)
    }

    /// Read `N G obj <object> endobj`.
    pub fn read_indirect(&mut self) -> Result<(ObjectId, PdfObject)> {
        let start = self.lexer.position();
        let id = match (
            self.lexer.next_token()?,
            self.lexer.next_token()?,
            self.lexer.next_token()?,
        ) {
            (Some(Token::Integer(num)), Some(Token::Integer(gen)), Some(kw)) if kw.is_keyword("obj") => {
                object_id(num, gen).ok_or_else(|| Error::malformed(start, "object number out of range"))?
            }
            _ => return Err(Error::malformed(start, "expected `N G obj` header")),
        };

        if self.lexer.peek_token()?.is_some_and(|t| t.is_keyword("endobj")) {
            self.lexer.next_token()?;
            return Ok((id, PdfObject::Null));
        }

        let object = self.read_object()?;
        if self.lexer.peek_token().ok().flatten().is_some_and(|t| t.is_keyword("endobj")) {
            self.lexer.next_token()?;
        }
        Ok((id, object))
    }

    fn parse(&mut self, token: Token, start: usize, depth: usize) -> Result<PdfObject> {
        if depth > MAX_NESTING {
            return Err(Error::malformed(start, "objects nested too deeply"));
        }
        match token {
            Token::Null => Ok(PdfObject::Null),
            Token::Boolean(v) => Ok(PdfObject::Boolean(v)),
            Token::Integer(v) => match self.syntax {
                Syntax::File => Ok(self
                    .try_reference(v)
                    .map(PdfObject::Reference)
                    .unwrap_or(PdfObject::Integer(v))),
                Syntax::Content => Ok(PdfObject::Integer(v)),
            },
            Token::Real(v) => Ok(PdfObject::Real(v)),
            Token::String(v) | Token::HexString(v) => Ok(PdfObject::String(v)),
            Token::Name(v) => Ok(PdfObject::Name(v)),
            Token::ArrayStart => self.parse_array(start, depth),
            Token::DictStart => {
                let dict = self.parse_dict(start, depth)?;
                if self.syntax == Syntax::File
                    && self.lexer.peek_token().ok().flatten().is_some_and(|t| t.is_keyword("stream"))
                {
                    self.lexer.next_token()?;
                    let raw = self.read_stream_payload(&dict)?;
                    return Ok(PdfObject::Stream(Stream::new(dict, raw)));
                }
                Ok(PdfObject::Dictionary(dict))
            }
            Token::ArrayEnd | Token::DictEnd => Err(Error::malformed(start, "unexpected closing delimiter")),
            Token::Keyword(kw) => Err(Error::malformed(start, format!("unexpected keyword `{kw}`"))),
        }
    }

    /// `first` has been read; accept `G R` after it, or rewind.
    fn try_reference(&mut self, first: i64) -> Option<ObjectId> {
        let saved = self.lexer.position();
        let reference = match (self.lexer.next_token(), self.lexer.next_token()) {
            (Ok(Some(Token::Integer(gen))), Ok(Some(kw))) if kw.is_keyword("R") => object_id(first, gen),
            _ => None,
        };
        if reference.is_none() {
            self.lexer.set_position(saved);
        }
        reference
    }

    fn parse_array(&mut self, start: usize, depth: usize) -> Result<PdfObject> {
        let mut items = Vec::new();
        loop {
            let item_start = self.lexer.position();
            match self.lexer.next_token()? {
                None => return Err(Error::malformed(start, "unterminated array")),
                Some(Token::ArrayEnd) => return Ok(PdfObject::Array(items)),
                Some(token) => items.push(self.parse(token, item_start, depth + 1)?),
            }
        }
    }

    fn parse_dict(&mut self, start: usize, depth: usize) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let entry_start = self.lexer.position();
            match self.lexer.next_token()? {
                None => return Err(Error::malformed(start, "unterminated dictionary")),
                Some(Token::DictEnd) => return Ok(dict),
                Some(Token::Name(key)) => {
                    if matches!(self.lexer.peek_token()?, Some(Token::DictEnd) | None) {
                        dict.insert(key, PdfObject::Null);
                        continue;
                    }
                    let value_start = self.lexer.position();
                    let token = self.lexer.next_token()?.ok_or_else(|| {
                        Error::malformed(start, "unterminated dictionary")
                    })?;
                    let value = self.parse(token, value_start, depth + 1)?;
                    dict.insert(key, value);
                }
                Some(token) => {
                    // A value without a key: parse it to stay in sync, then drop it.
                    log::debug!("Dropping dictionary value without key at offset {}", entry_start);
                    self.parse(token, entry_start, depth + 1)?;
                }
            }
        }
    }

    /// Capture the payload after `stream`, bounded by `/Length` when it is
    /// trustworthy and by the `endstream` marker otherwise.
    fn read_stream_payload(&mut self, dict: &Dictionary) -> Result<Vec<u8>> {
        self.lexer.skip_stream_linebreak();
        let start = self.lexer.position();
        let input = self.lexer.input();

        let declared = match dict.get("Length") {
            Some(PdfObject::Integer(n)) if *n >= 0 => Some(*n as usize),
            Some(PdfObject::Reference(id)) => self.lengths.and_then(|lookup| lookup(*id)),
            _ => None,
        };

        if let Some(len) = declared {
            if let Some(end) = start.checked_add(len).filter(|&end| end <= input.len()) {
                self.lexer.set_position(end);
                if self.lexer.next_token().ok().flatten().is_some_and(|t| t.is_keyword("endstream")) {
                    return Ok(input[start..end].to_vec());
                }
            }
            log::debug!("Stream at offset {} has a wrong /Length; scanning for endstream", start);
        }

        let Some(found) = memchr::memmem::find(&input[start..], b"endstream") else {
            return Err(Error::malformed(start, "stream has no usable /Length and no endstream marker"));
        };
        let marker = start + found;
        let mut end = marker;
        if end > start && input[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && input[end - 1] == b'\r' {
            end -= 1;
        }
        self.lexer.set_position(marker + b"endstream".len());
        Ok(input[start..end].to_vec())
    }
}

fn object_id(num: i64, gen: i64) -> Option<ObjectId> {
    let num = u32::try_from(num).ok()?;
    let gen = u16::try_from(gen).ok()?;
    Some((num, gen))
}

/// Read one object at `offset`; returns the object and the bytes consumed.
pub fn read_object(buffer: &[u8], offset: usize) -> Result<(PdfObject, usize)> {
    let mut reader = ObjectReader::new(buffer, offset);
    let object = reader.read_object()?;
    Ok((object, reader.position() - offset))
}

/// Read an indirect object definition at `offset`.
pub fn read_indirect_object(
    buffer: &[u8],
    offset: usize,
    lengths: LengthLookup<'_>,
) -> Result<(ObjectId, PdfObject)> {
    ObjectReader::new(buffer, offset)
        .with_lengths(lengths)
        .read_indirect()
}

/// The `N G` of an `N G obj` header at `offset`, if one is there.
pub fn read_object_header(buffer: &[u8], offset: usize) -> Option<ObjectId> {
    let mut lexer = Lexer::at(buffer, offset);
    match (
        lexer.next_token().ok()??,
        lexer.next_token().ok()??,
        lexer.next_token().ok()??,
    ) {
        (Token::Integer(num), Token::Integer(gen), kw) if kw.is_keyword("obj") => object_id(num, gen),
        _ => None,
    }
}
