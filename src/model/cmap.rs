//! `ToUnicode` character maps.
//!
//! Only the parts needed to turn character codes into text are read:
//! `codespacerange` (code widths), `bfchar` and `bfrange`. CID mappings
//! and `usecmap` are ignored.

use std::collections::HashMap;

use crate::error::Result;
use crate::parser::lexer::{Lexer, Token};

use super::encoding::decode_utf16be;

/// Upper bound on entries read from one CMap.
const MAX_ENTRIES: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq)]
struct CodespaceRange {
    low: Vec<u8>,
    high: Vec<u8>,
}

impl CodespaceRange {
    fn contains(&self, bytes: &[u8]) -> bool {
        bytes.len() == self.low.len()
            && bytes
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(b, (lo, hi))| lo <= b && b <= hi)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RangeTarget {
    /// Destination of the first code; later codes increment its last unit.
    Offset(Vec<u16>),
    /// One destination per code.
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
struct BfRange {
    len: usize,
    low: u32,
    high: u32,
    target: RangeTarget,
}

/// A parsed `ToUnicode` CMap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CMap {
    codespaces: Vec<CodespaceRange>,
    chars: HashMap<(usize, u32), String>,
    ranges: Vec<BfRange>,
}

impl CMap {
    /// Parse the decoded bytes of a CMap stream.
    ///
    /// Damage past the first bad token ends parsing; whatever was read
    /// up to that point is kept.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cmap = CMap::default();
        let mut lexer = Lexer::new(data);
        let mut operands: Vec<Token> = Vec::new();

        loop {
            let token = match lexer.next_token() {
                Ok(Some(token)) => token,
                Ok(None) => break,
                Err(err) => {
                    log::debug!("CMap parsing stopped: {}", err);
                    break;
                }
            };
            match token {
                Token::Keyword(kw) => {
                    match kw.as_str() {
                        "endcodespacerange" => cmap.read_codespaces(&operands),
                        "endbfchar" => cmap.read_bfchars(&operands),
                        "endbfrange" => cmap.read_bfranges(&operands),
                        _ => {}
                    }
                    operands.clear();
                }
                other => operands.push(other),
            }
            if cmap.chars.len() + cmap.ranges.len() > MAX_ENTRIES {
                log::debug!("CMap has too many entries; truncating");
                break;
            }
        }
        Ok(cmap)
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty() && self.ranges.is_empty()
    }

    /// Whether the CMap declares code widths.
    pub fn has_codespaces(&self) -> bool {
        !self.codespaces.is_empty()
    }

    /// Width in bytes of the code starting `bytes`, from the codespace
    /// ranges. `None` when no range matches.
    pub fn code_length(&self, bytes: &[u8]) -> Option<usize> {
        (1..=4)
            .take_while(|n| *n <= bytes.len())
            .find(|&n| self.codespaces.iter().any(|range| range.contains(&bytes[..n])))
    }

    /// Text for the `len`-byte code `code`.
    pub fn lookup(&self, code: u32, len: usize) -> Option<String> {
        if let Some(text) = self.chars.get(&(len, code)) {
            return Some(text.clone());
        }
        let range = self
            .ranges
            .iter()
            .find(|r| r.len == len && r.low <= code && code <= r.high)?;
        let delta = code - range.low;
        match &range.target {
            RangeTarget::Offset(units) => {
                let mut units = units.clone();
                let last = units.last_mut()?;
                *last = last.wrapping_add(u16::try_from(delta).ok()?);
                Some(
                    char::decode_utf16(units)
                        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                        .collect(),
                )
            }
            RangeTarget::List(items) => items.get(delta as usize).cloned(),
        }
    }

    fn read_codespaces(&mut self, operands: &[Token]) {
        for pair in operands.chunks_exact(2) {
            if let (Token::HexString(low), Token::HexString(high)) = (&pair[0], &pair[1]) {
                if low.len() == high.len() && !low.is_empty() {
                    self.codespaces.push(CodespaceRange {
                        low: low.clone(),
                        high: high.clone(),
                    });
                }
            }
        }
    }

    fn read_bfchars(&mut self, operands: &[Token]) {
        for pair in operands.chunks_exact(2) {
            let Token::HexString(src) = &pair[0] else {
                continue;
            };
            let Some(code) = code_value(src) else {
                continue;
            };
            let text = match &pair[1] {
                Token::HexString(dst) => decode_utf16be(dst),
                Token::Name(name) => match super::encoding::glyph_to_char(name) {
                    Some(ch) => ch.to_string(),
                    None => continue,
                },
                _ => continue,
            };
            self.chars.insert((src.len(), code), text);
        }
    }

    fn read_bfranges(&mut self, operands: &[Token]) {
        let mut i = 0;
        while i + 2 < operands.len() {
            let (Token::HexString(low), Token::HexString(high)) = (&operands[i], &operands[i + 1]) else {
                i += 1;
                continue;
            };
            let (Some(lo), Some(hi)) = (code_value(low), code_value(high)) else {
                i += 3;
                continue;
            };
            let len = low.len();
            match &operands[i + 2] {
                Token::HexString(dst) => {
                    let units = dst
                        .chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect::<Vec<_>>();
                    if lo <= hi && !units.is_empty() {
                        self.ranges.push(BfRange {
                            len,
                            low: lo,
                            high: hi,
                            target: RangeTarget::Offset(units),
                        });
                    }
                    i += 3;
                }
                Token::ArrayStart => {
                    let mut items = Vec::new();
                    let mut j = i + 3;
                    while let Some(Token::HexString(dst)) = operands.get(j) {
                        items.push(decode_utf16be(dst));
                        j += 1;
                    }
                    // Skip the closing bracket.
                    if matches!(operands.get(j), Some(Token::ArrayEnd)) {
                        j += 1;
                    }
                    if lo <= hi {
                        self.ranges.push(BfRange {
                            len,
                            low: lo,
                            high: hi,
                            target: RangeTarget::List(items),
                        });
                    }
                    i = j;
                }
                _ => i += 3,
            }
        }
    }
}

fn code_value(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}
