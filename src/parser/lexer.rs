//! Byte-level tokenizer for PDF object syntax and content streams.

use crate::error::{Error, Result};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Vec<u8>),
    HexString(Vec<u8>),
    Name(String),
    /// Any bare word: `obj`, `R`, `stream`, content operators, ...
    Keyword(String),
    DictStart,
    DictEnd,
    ArrayStart,
    ArrayEnd,
}

impl Token {
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Keyword(kw) if kw == word)
    }
}

/// Cursor over a byte buffer producing [`Token`]s.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Start tokenizing at `pos`.
    pub fn at(input: &'a [u8], pos: usize) -> Self {
        Self {
            input,
            pos: pos.min(input.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Read the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                return Ok(None);
            }

            let start = self.pos;
            let byte = self.input[self.pos];
            self.pos += 1;
            let token = match byte {
                b'[' => Token::ArrayStart,
                b']' => Token::ArrayEnd,
                b'<' if self.peek_byte() == Some(b'<') => {
                    self.pos += 1;
                    Token::DictStart
                }
                b'>' if self.peek_byte() == Some(b'>') => {
                    self.pos += 1;
                    Token::DictEnd
                }
                b'(' => Token::String(self.read_literal_string(start)?),
                b'<' => Token::HexString(self.read_hex_string(start)?),
                b'/' => Token::Name(self.read_name()),
                b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number(start),
                b'{' | b'}' => Token::Keyword((byte as char).to_string()),
                // Stray closing delimiters carry no meaning on their own.
                b')' | b'>' => continue,
                _ => self.read_word(start),
            };
            return Ok(Some(token));
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        let saved = self.pos;
        let token = self.next_token();
        self.pos = saved;
        token
    }

    pub fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.input.len() && is_whitespace(self.input[self.pos]) {
                self.pos += 1;
            }
            if self.pos < self.input.len() && self.input[self.pos] == b'%' {
                while self.pos < self.input.len()
                    && self.input[self.pos] != b'\n'
                    && self.input[self.pos] != b'\r'
                {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    /// Skip the single end-of-line marker that follows the `stream` keyword.
    pub fn skip_stream_linebreak(&mut self) {
        // Some writers put spaces between `stream` and the EOL.
        while self.peek_byte() == Some(b' ') {
            self.pos += 1;
        }
        if self.peek_byte() == Some(b'\r') {
            self.pos += 1;
            if self.peek_byte() == Some(b'\n') {
                self.pos += 1;
            }
        } else if self.peek_byte() == Some(b'\n') {
            self.pos += 1;
        }
    }

    /// Skip raw inline-image data after an `ID` operator, stopping after
    /// the matching `EI`.
    pub fn skip_inline_image_data(&mut self) {
        // `ID` is followed by exactly one whitespace byte.
        if self.peek_byte().is_some_and(is_whitespace) {
            self.pos += 1;
        }
        let mut i = self.pos;
        while i + 1 < self.input.len() {
            if self.input[i] == b'E' && self.input[i + 1] == b'I' {
                let prev_ok = i == self.pos || is_whitespace(self.input[i - 1]);
                let next_ok = i + 2 >= self.input.len()
                    || is_whitespace(self.input[i + 2])
                    || is_delimiter(self.input[i + 2]);
                if prev_ok && next_ok {
                    self.pos = i + 2;
                    return;
                }
            }
            i += 1;
        }
        self.pos = self.input.len();
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn read_literal_string(&mut self, start: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut depth = 1usize;
        while self.pos < self.input.len() {
            let byte = self.input[self.pos];
            self.pos += 1;
            match byte {
                b'\\' => {
                    let Some(next) = self.peek_byte() else {
                        return Err(Error::malformed(start, "string ends inside an escape"));
                    };
                    self.pos += 1;
                    match next {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'\\' | b'(' | b')' => out.push(next),
                        b'\r' => {
                            if self.peek_byte() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut val = u16::from(next - b'0');
                            for _ in 0..2 {
                                match self.peek_byte() {
                                    Some(b @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        val = (val << 3) | u16::from(b - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            out.push((val & 0xFF) as u8);
                        }
                        // Unknown escapes drop the backslash.
                        other => out.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(byte);
                }
                _ => out.push(byte),
            }
        }
        Err(Error::malformed(start, "unterminated literal string"))
    }

    fn read_hex_string(&mut self, start: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut pending: Option<u8> = None;
        while self.pos < self.input.len() {
            let byte = self.input[self.pos];
            self.pos += 1;
            if byte == b'>' {
                if let Some(high) = pending {
                    out.push(high << 4);
                }
                return Ok(out);
            }
            if is_whitespace(byte) {
                continue;
            }
            let nibble = hex_value(byte).ok_or_else(|| {
                Error::malformed(self.pos - 1, format!("invalid hex digit 0x{byte:02X}"))
            })?;
            match pending.take() {
                Some(high) => out.push((high << 4) | nibble),
                None => pending = Some(nibble),
            }
        }
        Err(Error::malformed(start, "unterminated hex string"))
    }

    fn read_name(&mut self) -> String {
        let mut out = Vec::new();
        while let Some(byte) = self.peek_byte() {
            if !is_regular(byte) {
                break;
            }
            self.pos += 1;
            if byte == b'#' {
                let hi = self.input.get(self.pos).copied().and_then(hex_value);
                let lo = self.input.get(self.pos + 1).copied().and_then(hex_value);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi << 4) | lo);
                    self.pos += 2;
                    continue;
                }
            }
            out.push(byte);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    fn read_number(&mut self, start: usize) -> Token {
        while let Some(byte) = self.peek_byte() {
            if byte.is_ascii_digit() || byte == b'.' || byte == b'-' || byte == b'+' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw = &self.input[start..self.pos];
        let text = std::str::from_utf8(raw).unwrap_or("0");
        if raw.contains(&b'.') {
            return Token::Real(parse_lenient_real(text));
        }
        match text.parse::<i64>() {
            Ok(v) => Token::Integer(v),
            Err(_) => Token::Real(parse_lenient_real(text)),
        }
    }

    fn read_word(&mut self, start: usize) -> Token {
        while self.peek_byte().is_some_and(is_regular) {
            self.pos += 1;
        }
        match &self.input[start..self.pos] {
            b"true" => Token::Boolean(true),
            b"false" => Token::Boolean(false),
            b"null" => Token::Null,
            word => Token::Keyword(String::from_utf8_lossy(word).into_owned()),
        }
    }
}

/// Parse malformed reals such as `--5` or `1.2.3` the way viewers do:
/// keep the longest valid prefix after collapsing repeated signs.
fn parse_lenient_real(text: &str) -> f64 {
    let negative = text.starts_with('-');
    let body = text.trim_start_matches(['+', '-']);
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in body.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => {
                seen_dot = true;
                end = i + 1;
            }
            _ => break,
        }
    }
    let value = body[..end].parse::<f64>().unwrap_or(0.0);
    if negative {
        -value
    } else {
        value
    }
}

pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0C | 0x00)
}

pub fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

pub fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

pub fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
