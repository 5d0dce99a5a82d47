//! Stream decode filters and predictors.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::error::{Error, Result};

use super::object::{Dictionary, PdfObject};

/// A decode filter named by a stream's `/Filter` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    Flate,
    Lzw,
    AsciiHex,
    Ascii85,
    RunLength,
    /// Image codecs, `Crypt` and anything unknown.
    Unsupported(String),
}

impl FilterKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "FlateDecode" | "Fl" => FilterKind::Flate,
            "LZWDecode" | "LZW" => FilterKind::Lzw,
            "ASCIIHexDecode" | "AHx" => FilterKind::AsciiHex,
            "ASCII85Decode" | "A85" => FilterKind::Ascii85,
            "RunLengthDecode" | "RL" => FilterKind::RunLength,
            other => FilterKind::Unsupported(other.to_string()),
        }
    }

    fn label(&self) -> &str {
        match self {
            FilterKind::Flate => "FlateDecode",
            FilterKind::Lzw => "LZWDecode",
            FilterKind::AsciiHex => "ASCIIHexDecode",
            FilterKind::Ascii85 => "ASCII85Decode",
            FilterKind::RunLength => "RunLengthDecode",
            FilterKind::Unsupported(name) => name,
        }
    }
}

/// One step of a stream's filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub kind: FilterKind,
    pub params: Option<Dictionary>,
}

/// Read the filter chain from a stream dictionary.
///
/// Indirect `/Filter` values cannot be followed here; they produce an
/// unsupported step so decoding reports them instead of returning garbage.
pub(crate) fn chain_from_dict(dict: &Dictionary) -> Vec<Filter> {
    let params_at = |index: usize| -> Option<Dictionary> {
        match dict.get("DecodeParms") {
            Some(PdfObject::Dictionary(d)) if index == 0 => Some(d.clone()),
            Some(PdfObject::Array(items)) => items.get(index).and_then(|p| p.as_dict()).cloned(),
            _ => None,
        }
    };

    match dict.get("Filter") {
        None | Some(PdfObject::Null) => Vec::new(),
        Some(PdfObject::Name(name)) => vec![Filter {
            kind: FilterKind::from_name(name),
            params: params_at(0),
        }],
        Some(PdfObject::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| Filter {
                kind: match item.as_name() {
                    Some(name) => FilterKind::from_name(name),
                    None => FilterKind::Unsupported(format!("<{}>", item.type_name())),
                },
                params: params_at(i),
            })
            .collect(),
        Some(other) => vec![Filter {
            kind: FilterKind::Unsupported(format!("<{}>", other.type_name())),
            params: None,
        }],
    }
}

/// Apply each filter in order.
pub fn decode_chain(data: &[u8], filters: &[Filter]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for filter in filters {
        current = decode_one(&current, filter)?;
    }
    Ok(current)
}

fn decode_one(data: &[u8], filter: &Filter) -> Result<Vec<u8>> {
    let decoded = match &filter.kind {
        FilterKind::Flate => flate_decode(data)?,
        FilterKind::Lzw => {
            let early_change = filter
                .params
                .as_ref()
                .and_then(|p| p.get_i64("EarlyChange"))
                .unwrap_or(1);
            lzw_decode(data, early_change != 0)?
        }
        FilterKind::AsciiHex => ascii_hex_decode(data)?,
        FilterKind::Ascii85 => ascii85_decode(data)?,
        FilterKind::RunLength => run_length_decode(data),
        FilterKind::Unsupported(name) => return Err(Error::UnsupportedFilter(name.clone())),
    };

    match (&filter.kind, &filter.params) {
        (FilterKind::Flate | FilterKind::Lzw, Some(params)) => apply_predictor(decoded, params),
        _ => Ok(decoded),
    }
}

fn decode_error(kind: &FilterKind, reason: impl Into<String>) -> Error {
    Error::StreamDecode {
        filter: kind.label().to_string(),
        reason: reason.into(),
    }
}

/// Zlib inflate, falling back to raw deflate. Truncated streams keep
/// whatever was inflated before the damage.
fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match ZlibDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => return Ok(out),
        Err(err) if !out.is_empty() => {
            log::debug!("Flate stream truncated after {} bytes: {}", out.len(), err);
            return Ok(out);
        }
        Err(_) => {}
    }

    let mut raw = Vec::new();
    match DeflateDecoder::new(data).read_to_end(&mut raw) {
        Ok(_) => Ok(raw),
        Err(_) if !raw.is_empty() => Ok(raw),
        Err(err) => Err(decode_error(&FilterKind::Flate, err.to_string())),
    }
}

fn lzw_decode(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    const CLEAR: usize = 256;
    const EOD: usize = 257;

    let fresh_table = || -> Vec<Vec<u8>> {
        let mut table: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
        table.push(Vec::new());
        table.push(Vec::new());
        table
    };

    let mut table = fresh_table();
    let mut out = Vec::new();
    let mut code_len = 9u32;
    let mut prev: Option<usize> = None;
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut input = data.iter();

    loop {
        while bits < code_len {
            match input.next() {
                Some(&byte) => {
                    acc = (acc << 8) | u32::from(byte);
                    bits += 8;
                }
                None => return Ok(out),
            }
        }
        let code = ((acc >> (bits - code_len)) & ((1 << code_len) - 1)) as usize;
        bits -= code_len;

        if code == CLEAR {
            table = fresh_table();
            code_len = 9;
            prev = None;
            continue;
        }
        if code == EOD {
            return Ok(out);
        }

        let entry = match (table.get(code), prev) {
            (Some(entry), _) => entry.clone(),
            (None, Some(p)) if code == table.len() => {
                let mut entry = table[p].clone();
                entry.push(table[p][0]);
                entry
            }
            _ => return Err(decode_error(&FilterKind::Lzw, format!("invalid code {code}"))),
        };
        out.extend_from_slice(&entry);

        if let Some(p) = prev {
            if table.len() < 4096 {
                let mut next = table[p].clone();
                next.push(entry[0]);
                table.push(next);
            }
        }
        prev = Some(code);

        let threshold = table.len() + usize::from(early_change);
        if threshold >= (1 << code_len) && code_len < 12 {
            code_len += 1;
        }
    }
}

fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        if super::lexer::is_whitespace(byte) {
            continue;
        }
        let nibble = super::lexer::hex_value(byte).ok_or_else(|| {
            decode_error(&FilterKind::AsciiHex, format!("invalid digit 0x{byte:02X}"))
        })?;
        match pending.take() {
            Some(high) => out.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }
    if let Some(high) = pending {
        out.push(high << 4);
    }
    Ok(out)
}

fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    let body = data.strip_prefix(b"<~").unwrap_or(data);
    for &byte in body {
        match byte {
            b'~' => break,
            b'z' if count == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = byte - b'!';
                count += 1;
                if count == 5 {
                    out.extend_from_slice(&ascii85_group(&group).to_be_bytes());
                    count = 0;
                }
            }
            b if super::lexer::is_whitespace(b) => {}
            other => {
                return Err(decode_error(
                    &FilterKind::Ascii85,
                    format!("invalid character 0x{other:02X}"),
                ))
            }
        }
    }

    if count == 1 {
        return Err(decode_error(&FilterKind::Ascii85, "dangling final byte"));
    }
    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u' - b'!';
        }
        let bytes = ascii85_group(&group).to_be_bytes();
        out.extend_from_slice(&bytes[..count - 1]);
    }
    Ok(out)
}

fn ascii85_group(group: &[u8; 5]) -> u32 {
    group
        .iter()
        .fold(0u32, |acc, &digit| acc.wrapping_mul(85).wrapping_add(u32::from(digit)))
}

fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        i += 1;
        match len {
            0..=127 => {
                let end = (i + len + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            128 => break,
            _ => {
                if let Some(&byte) = data.get(i) {
                    out.extend(std::iter::repeat(byte).take(257 - len));
                }
                i += 1;
            }
        }
    }
    out
}

/// Undo PNG (10-15) or TIFF (2) prediction described by `/DecodeParms`.
fn apply_predictor(data: Vec<u8>, params: &Dictionary) -> Result<Vec<u8>> {
    let predictor = params.get_i64("Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = params.get_i64("Colors").unwrap_or(1).clamp(1, 32) as usize;
    let bpc = params.get_i64("BitsPerComponent").unwrap_or(8).clamp(1, 16) as usize;
    let columns = params.get_i64("Columns").unwrap_or(1).clamp(1, 1 << 20) as usize;
    let bytes_per_pixel = (colors * bpc).div_ceil(8);
    let row_len = (colors * bpc * columns).div_ceil(8);

    if predictor == 2 {
        if bpc != 8 {
            return Err(Error::UnsupportedFilter(format!(
                "TIFF predictor with {bpc} bits per component"
            )));
        }
        let mut out = data;
        for row in out.chunks_mut(row_len) {
            for i in bytes_per_pixel..row.len() {
                row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
            }
        }
        return Ok(out);
    }

    if predictor < 10 {
        return Err(Error::UnsupportedFilter(format!("predictor {predictor}")));
    }

    let mut out = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];
    for chunk in data.chunks(row_len + 1) {
        let (&tag, encoded) = match chunk.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);
        for i in 0..row_len {
            let left = if i >= bytes_per_pixel { row[i - bytes_per_pixel] } else { 0 };
            let up = prev_row[i];
            let upper_left = if i >= bytes_per_pixel {
                prev_row[i - bytes_per_pixel]
            } else {
                0
            };
            row[i] = match tag {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, upper_left)),
                other => {
                    return Err(decode_error(
                        &FilterKind::Flate,
                        format!("unknown PNG row filter {other}"),
                    ))
                }
            };
        }
        out.extend_from_slice(&row[..encoded.len().min(row_len)]);
        prev_row = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn filter(kind: FilterKind) -> Filter {
        Filter { kind, params: None }
    }

    #[test]
    fn test_flate_decode() {
        let encoded = zlib(b"BT (Hello) Tj ET");
        let out = decode_chain(&encoded, &[filter(FilterKind::Flate)]).unwrap();
        assert_eq!(out, b"BT (Hello) Tj ET");
    }

    #[test]
    fn test_flate_garbage_fails() {
        let result = decode_chain(b"\x00\x01not deflate", &[filter(FilterKind::Flate)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_chain_applies_in_order() {
        let hex: String = zlib(b"chained").iter().map(|b| format!("{b:02x}")).collect();
        let filters = [filter(FilterKind::AsciiHex), filter(FilterKind::Flate)];
        let out = decode_chain(format!("{hex}>").as_bytes(), &filters).unwrap();
        assert_eq!(out, b"chained");
    }

    #[test]
    fn test_ascii85_decode() {
        let out = ascii85_decode(b"<~9jqo^BlbD-BleB1DJ+*+F(f,q~>").unwrap();
        assert_eq!(out, b"Man is distinguished");
    }

    #[test]
    fn test_ascii85_z_shortcut() {
        assert_eq!(ascii85_decode(b"z~>").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_run_length_decode() {
        let data = [2, b'a', b'b', b'c', 254, b'x', 128];
        assert_eq!(run_length_decode(&data), b"abcxxx");
    }

    #[test]
    fn test_lzw_decode_reference_sample() {
        // Example from the LZWDecode section of the PDF reference:
        // 45 45 45 45 45 65 45 45 45 66 encodes to 80 0B 60 50 22 0C 0C 85 01.
        let encoded = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        let out = lzw_decode(&encoded, true).unwrap();
        assert_eq!(out, vec![0x2D, 0x2D, 0x2D, 0x2D, 0x2D, 0x41, 0x2D, 0x2D, 0x2D, 0x42]);
    }

    #[test]
    fn test_png_up_predictor() {
        let mut params = Dictionary::new();
        params.insert("Predictor", PdfObject::Integer(12));
        params.insert("Columns", PdfObject::Integer(3));
        // Row 1 unfiltered, row 2 "Up" adds 1 to each byte.
        let data = vec![0, 1, 2, 3, 2, 1, 1, 1];
        let out = apply_predictor(data, &params).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_unsupported_filter_is_reported() {
        let err = decode_chain(b"jpeg", &[filter(FilterKind::from_name("DCTDecode"))]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFilter(name) if name == "DCTDecode"));
    }

    #[test]
    fn test_chain_from_dict_with_params_array() {
        let mut params = Dictionary::new();
        params.insert("Predictor", PdfObject::Integer(12));
        let mut dict = Dictionary::new();
        dict.insert(
            "Filter",
            PdfObject::Array(vec![
                PdfObject::Name("A85".into()),
                PdfObject::Name("FlateDecode".into()),
            ]),
        );
        dict.insert(
            "DecodeParms",
            PdfObject::Array(vec![PdfObject::Null, PdfObject::Dictionary(params.clone())]),
        );
        let chain = chain_from_dict(&dict);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].kind, FilterKind::Ascii85);
        assert_eq!(chain[0].params, None);
        assert_eq!(chain[1].params, Some(params));
    }
}
