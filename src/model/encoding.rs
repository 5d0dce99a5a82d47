//! Single-byte font encodings, glyph names and PDF text strings.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::parser::PdfObject;

/// A predefined base encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
    /// Used for text strings outside content streams.
    PdfDoc,
}

impl BaseEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(BaseEncoding::Standard),
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            "PDFDocEncoding" => Some(BaseEncoding::PdfDoc),
            _ => None,
        }
    }

    /// Character for a single-byte code, `None` for unused codes.
    pub fn decode(self, code: u8) -> Option<char> {
        match code {
            0x00..=0x1F => match self {
                BaseEncoding::PdfDoc => pdf_doc_low(code),
                _ => None,
            },
            0x27 if self == BaseEncoding::Standard => Some('\u{2019}'),
            0x60 if self == BaseEncoding::Standard => Some('\u{2018}'),
            0x20..=0x7E => Some(code as char),
            0x7F => None,
            _ => {
                let table = match self {
                    BaseEncoding::Standard => &STANDARD_HIGH,
                    BaseEncoding::WinAnsi => &WIN_ANSI_HIGH,
                    BaseEncoding::MacRoman => &MAC_ROMAN_HIGH,
                    BaseEncoding::PdfDoc => &PDF_DOC_HIGH,
                };
                match table[usize::from(code - 0x80)] {
                    0 => None,
                    unit => char::from_u32(u32::from(unit)),
                }
            }
        }
    }
}

fn pdf_doc_low(code: u8) -> Option<char> {
    match code {
        0x09 | 0x0A | 0x0D => Some(code as char),
        0x18 => Some('\u{02D8}'),
        0x19 => Some('\u{02C7}'),
        0x1A => Some('\u{02C6}'),
        0x1B => Some('\u{02D9}'),
        0x1C => Some('\u{02DD}'),
        0x1D => Some('\u{02DB}'),
        0x1E => Some('\u{02DA}'),
        0x1F => Some('\u{02DC}'),
        _ => None,
    }
}

/// A full 256-entry code table: a base encoding with `/Differences`
/// applied on top.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleEncoding {
    table: [Option<char>; 256],
}

impl SimpleEncoding {
    pub fn new(base: BaseEncoding) -> Self {
        let mut table = [None; 256];
        for (code, slot) in table.iter_mut().enumerate() {
            *slot = base.decode(code as u8);
        }
        Self { table }
    }

    /// Apply a `/Differences` array: a code followed by the glyph names
    /// for consecutive codes, repeated.
    pub fn apply_differences(&mut self, differences: &[PdfObject]) {
        let mut code: Option<usize> = None;
        for item in differences {
            match item {
                PdfObject::Integer(start) => code = usize::try_from(*start).ok(),
                PdfObject::Name(name) => {
                    let Some(current) = code.filter(|c| *c < 256) else {
                        continue;
                    };
                    if let Some(ch) = glyph_to_char(name) {
                        self.table[current] = Some(ch);
                    } else {
                        log::debug!("Unknown glyph name /{} for code {}", name, current);
                    }
                    code = Some(current + 1);
                }
                _ => {}
            }
        }
    }

    pub fn decode(&self, code: u8) -> Option<char> {
        self.table[usize::from(code)]
    }

    /// Decode every byte, dropping unused codes.
    pub fn decode_bytes(&self, bytes: &[u8]) -> String {
        bytes.iter().filter_map(|&b| self.decode(b)).collect()
    }
}

impl Default for SimpleEncoding {
    fn default() -> Self {
        Self::new(BaseEncoding::WinAnsi)
    }
}

/// `WinAnsiEncoding` for codes 0x80 to 0xFF; zero marks an unused code.
const WIN_ANSI_HIGH: [u16; 128] = [
    0x20AC, 0x0000, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021,
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0x0000, 0x017D, 0x0000,
    0x0000, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014,
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x0000, 0x017E, 0x0178,
    0x00A0, 0x00A1, 0x00A2, 0x00A3, 0x00A4, 0x00A5, 0x00A6, 0x00A7,
    0x00A8, 0x00A9, 0x00AA, 0x00AB, 0x00AC, 0x00AD, 0x00AE, 0x00AF,
    0x00B0, 0x00B1, 0x00B2, 0x00B3, 0x00B4, 0x00B5, 0x00B6, 0x00B7,
    0x00B8, 0x00B9, 0x00BA, 0x00BB, 0x00BC, 0x00BD, 0x00BE, 0x00BF,
    0x00C0, 0x00C1, 0x00C2, 0x00C3, 0x00C4, 0x00C5, 0x00C6, 0x00C7,
    0x00C8, 0x00C9, 0x00CA, 0x00CB, 0x00CC, 0x00CD, 0x00CE, 0x00CF,
    0x00D0, 0x00D1, 0x00D2, 0x00D3, 0x00D4, 0x00D5, 0x00D6, 0x00D7,
    0x00D8, 0x00D9, 0x00DA, 0x00DB, 0x00DC, 0x00DD, 0x00DE, 0x00DF,
    0x00E0, 0x00E1, 0x00E2, 0x00E3, 0x00E4, 0x00E5, 0x00E6, 0x00E7,
    0x00E8, 0x00E9, 0x00EA, 0x00EB, 0x00EC, 0x00ED, 0x00EE, 0x00EF,
    0x00F0, 0x00F1, 0x00F2, 0x00F3, 0x00F4, 0x00F5, 0x00F6, 0x00F7,
    0x00F8, 0x00F9, 0x00FA, 0x00FB, 0x00FC, 0x00FD, 0x00FE, 0x00FF,
];

/// `StandardEncoding` for codes 0x80 to 0xFF.
const STANDARD_HIGH: [u16; 128] = [
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x00A1, 0x00A2, 0x00A3, 0x2044, 0x00A5, 0x0192, 0x00A7,
    0x00A4, 0x0027, 0x201C, 0x00AB, 0x2039, 0x203A, 0xFB01, 0xFB02,
    0x0000, 0x2013, 0x2020, 0x2021, 0x00B7, 0x0000, 0x00B6, 0x2022,
    0x201A, 0x201E, 0x201D, 0x00BB, 0x2026, 0x2030, 0x0000, 0x00BF,
    0x0000, 0x0060, 0x00B4, 0x02C6, 0x02DC, 0x00AF, 0x02D8, 0x02D9,
    0x00A8, 0x0000, 0x02DA, 0x00B8, 0x0000, 0x02DD, 0x02DB, 0x02C7,
    0x2014, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x00C6, 0x0000, 0x00AA, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0141, 0x00D8, 0x0152, 0x00BA, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x00E6, 0x0000, 0x0000, 0x0000, 0x0131, 0x0000, 0x0000,
    0x0142, 0x00F8, 0x0153, 0x00DF, 0x0000, 0x0000, 0x0000, 0x0000,
];

/// `MacRomanEncoding` for codes 0x80 to 0xFF.
const MAC_ROMAN_HIGH: [u16; 128] = [
    0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1,
    0x00E0, 0x00E2, 0x00E4, 0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8,
    0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF, 0x00F1, 0x00F3,
    0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC,
    0x2020, 0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF,
    0x00AE, 0x00A9, 0x2122, 0x00B4, 0x00A8, 0x2260, 0x00C6, 0x00D8,
    0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202, 0x2211,
    0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8,
    0x00BF, 0x00A1, 0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB,
    0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3, 0x00D5, 0x0152, 0x0153,
    0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA,
    0x00FF, 0x0178, 0x2044, 0x00A4, 0x2039, 0x203A, 0xFB01, 0xFB02,
    0x2021, 0x00B7, 0x201A, 0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1,
    0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC, 0x00D3, 0x00D4,
    0x0000, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC,
    0x00AF, 0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
];

/// PDFDocEncoding for codes 0x80 to 0xFF.
const PDF_DOC_HIGH: [u16; 128] = [
    0x2022, 0x2020, 0x2021, 0x2026, 0x2014, 0x2013, 0x0192, 0x2044,
    0x2039, 0x203A, 0x2212, 0x2030, 0x201E, 0x201C, 0x201D, 0x2018,
    0x2019, 0x201A, 0x2122, 0xFB01, 0xFB02, 0x0141, 0x0152, 0x0160,
    0x0178, 0x017D, 0x0131, 0x0142, 0x0153, 0x0161, 0x017E, 0x0000,
    0x20AC, 0x00A1, 0x00A2, 0x00A3, 0x00A4, 0x00A5, 0x00A6, 0x00A7,
    0x00A8, 0x00A9, 0x00AA, 0x00AB, 0x00AC, 0x0000, 0x00AE, 0x00AF,
    0x00B0, 0x00B1, 0x00B2, 0x00B3, 0x00B4, 0x00B5, 0x00B6, 0x00B7,
    0x00B8, 0x00B9, 0x00BA, 0x00BB, 0x00BC, 0x00BD, 0x00BE, 0x00BF,
    0x00C0, 0x00C1, 0x00C2, 0x00C3, 0x00C4, 0x00C5, 0x00C6, 0x00C7,
    0x00C8, 0x00C9, 0x00CA, 0x00CB, 0x00CC, 0x00CD, 0x00CE, 0x00CF,
    0x00D0, 0x00D1, 0x00D2, 0x00D3, 0x00D4, 0x00D5, 0x00D6, 0x00D7,
    0x00D8, 0x00D9, 0x00DA, 0x00DB, 0x00DC, 0x00DD, 0x00DE, 0x00DF,
    0x00E0, 0x00E1, 0x00E2, 0x00E3, 0x00E4, 0x00E5, 0x00E6, 0x00E7,
    0x00E8, 0x00E9, 0x00EA, 0x00EB, 0x00EC, 0x00ED, 0x00EE, 0x00EF,
    0x00F0, 0x00F1, 0x00F2, 0x00F3, 0x00F4, 0x00F5, 0x00F6, 0x00F7,
    0x00F8, 0x00F9, 0x00FA, 0x00FB, 0x00FC, 0x00FD, 0x00FE, 0x00FF,
];

/// Glyph names for codes 0x20 to 0x7E.
const ASCII_GLYPH_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand",
    "quotesingle", "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period",
    "slash", "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    "colon", "semicolon", "less", "equal", "greater", "question", "at", "A", "B", "C", "D",
    "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V",
    "W", "X", "Y", "Z", "bracketleft", "backslash", "bracketright", "asciicircum",
    "underscore", "grave", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar",
    "braceright", "asciitilde",
];

/// Glyph names for U+00A0 to U+00FF.
const LATIN1_GLYPH_NAMES: [&str; 96] = [
    "nbspace", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section",
    "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot", "sfthyphen",
    "registered", "macron", "degree", "plusminus", "twosuperior", "threesuperior", "acute",
    "mu", "paragraph", "periodcentered", "cedilla", "onesuperior", "ordmasculine",
    "guillemotright", "onequarter", "onehalf", "threequarters", "questiondown", "Agrave",
    "Aacute", "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla", "Egrave",
    "Eacute", "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis",
    "Eth", "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply",
    "Oslash", "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls",
    "agrave", "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla",
    "egrave", "eacute", "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex",
    "idieresis", "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde", "odieresis",
    "divide", "oslash", "ugrave", "uacute", "ucircumflex", "udieresis", "yacute", "thorn",
    "ydieresis",
];

/// Glyph names outside the ASCII and Latin-1 ranges.
const EXTRA_GLYPH_NAMES: &[(&str, char)] = &[
    ("Euro", '\u{20AC}'),
    ("quotesinglbase", '\u{201A}'),
    ("florin", '\u{0192}'),
    ("quotedblbase", '\u{201E}'),
    ("ellipsis", '\u{2026}'),
    ("dagger", '\u{2020}'),
    ("daggerdbl", '\u{2021}'),
    ("circumflex", '\u{02C6}'),
    ("perthousand", '\u{2030}'),
    ("Scaron", '\u{0160}'),
    ("scaron", '\u{0161}'),
    ("guilsinglleft", '\u{2039}'),
    ("guilsinglright", '\u{203A}'),
    ("OE", '\u{0152}'),
    ("oe", '\u{0153}'),
    ("Zcaron", '\u{017D}'),
    ("zcaron", '\u{017E}'),
    ("Ydieresis", '\u{0178}'),
    ("quoteleft", '\u{2018}'),
    ("quoteright", '\u{2019}'),
    ("quotedblleft", '\u{201C}'),
    ("quotedblright", '\u{201D}'),
    ("bullet", '\u{2022}'),
    ("endash", '\u{2013}'),
    ("emdash", '\u{2014}'),
    ("tilde", '\u{02DC}'),
    ("trademark", '\u{2122}'),
    ("fraction", '\u{2044}'),
    ("ff", '\u{FB00}'),
    ("fi", '\u{FB01}'),
    ("fl", '\u{FB02}'),
    ("ffi", '\u{FB03}'),
    ("ffl", '\u{FB04}'),
    ("Lslash", '\u{0141}'),
    ("lslash", '\u{0142}'),
    ("dotlessi", '\u{0131}'),
    ("breve", '\u{02D8}'),
    ("dotaccent", '\u{02D9}'),
    ("ring", '\u{02DA}'),
    ("hungarumlaut", '\u{02DD}'),
    ("ogonek", '\u{02DB}'),
    ("caron", '\u{02C7}'),
    ("minus", '\u{2212}'),
    ("notequal", '\u{2260}'),
    ("infinity", '\u{221E}'),
    ("lessequal", '\u{2264}'),
    ("greaterequal", '\u{2265}'),
    ("partialdiff", '\u{2202}'),
    ("summation", '\u{2211}'),
    ("product", '\u{220F}'),
    ("pi", '\u{03C0}'),
    ("integral", '\u{222B}'),
    ("Omega", '\u{03A9}'),
    ("radical", '\u{221A}'),
    ("approxequal", '\u{2248}'),
    ("Delta", '\u{2206}'),
    ("lozenge", '\u{25CA}'),
    ("space", ' '),
    ("nbspace", '\u{00A0}'),
    ("hyphen", '-'),
];

fn glyph_table() -> &'static HashMap<&'static str, char> {
    static TABLE: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let ascii = ASCII_GLYPH_NAMES
            .iter()
            .zip(0x20u8..)
            .map(|(name, code)| (*name, code as char));
        let latin = LATIN1_GLYPH_NAMES
            .iter()
            .zip(0xA0u32..)
            .filter_map(|(name, code)| Some((*name, char::from_u32(code)?)));
        ascii
            .chain(latin)
            .chain(EXTRA_GLYPH_NAMES.iter().copied())
            .collect()
    })
}

/// Map a glyph name to its character.
///
/// Knows the Latin glyph names plus the `uniXXXX` and `uXXXX[XX]` forms.
/// Suffixes such as `.sc` or `.alt` are ignored.
pub fn glyph_to_char(name: &str) -> Option<char> {
    let base = name.split('.').next().unwrap_or(name);
    if let Some(&ch) = glyph_table().get(base) {
        return Some(ch);
    }
    if let Some(hex) = base.strip_prefix("uni") {
        if hex.len() == 4 {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }
    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }
    None
}

/// Decode a PDF text string (document information values, outlines).
///
/// Handles UTF-16BE and UTF-8 byte order marks; everything else is
/// PDFDocEncoding.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16be(rest);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes
        .iter()
        .filter_map(|&b| BaseEncoding::PdfDoc.decode(b))
        .collect()
}

/// Decode big-endian UTF-16, replacing unpaired surrogates.
pub fn decode_utf16be(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_high_codes() {
        let enc = SimpleEncoding::new(BaseEncoding::WinAnsi);
        assert_eq!(enc.decode(0x80), Some('\u{20AC}'));
        assert_eq!(enc.decode(0x93), Some('\u{201C}'));
        assert_eq!(enc.decode(0xE9), Some('\u{00E9}'));
        assert_eq!(enc.decode(0x81), None);
    }

    #[test]
    fn test_standard_encoding_quotes() {
        assert_eq!(BaseEncoding::Standard.decode(0x27), Some('\u{2019}'));
        assert_eq!(BaseEncoding::Standard.decode(0xAE), Some('\u{FB01}'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x27), Some('\''));
    }

    #[test]
    fn test_mac_roman() {
        assert_eq!(BaseEncoding::MacRoman.decode(0x8E), Some('\u{00E9}'));
        assert_eq!(BaseEncoding::MacRoman.decode(0xDB), Some('\u{00A4}'));
    }

    #[test]
    fn test_differences() {
        let mut enc = SimpleEncoding::default();
        enc.apply_differences(&[
            PdfObject::Integer(65),
            PdfObject::Name("Omega".into()),
            PdfObject::Name("uni03B1".into()),
            PdfObject::Integer(200),
            PdfObject::Name("fi".into()),
        ]);
        assert_eq!(enc.decode_bytes(b"ABC"), "\u{03A9}\u{03B1}C");
        assert_eq!(enc.decode(200), Some('\u{FB01}'));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_to_char("eacute"), Some('\u{00E9}'));
        assert_eq!(glyph_to_char("a.sc"), Some('a'));
        assert_eq!(glyph_to_char("u1F600"), Some('\u{1F600}'));
        assert_eq!(glyph_to_char("zero"), Some('0'));
        assert_eq!(glyph_to_char("g123"), None);
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(decode_text_string(b"\xEF\xBB\xBFcaf\xC3\xA9"), "caf\u{00E9}");
        assert_eq!(decode_text_string(b"Report \x84 2024"), "Report \u{2014} 2024");
    }
}
