//! Font encodings, `ToUnicode` maps and composite fonts, end to end.

mod common;

use common::PdfBuilder;
use pdfsift::parse_bytes;

/// One page showing `content` with the font body as `/F1`.
fn page_with_font(pdf: &mut PdfBuilder, font: u32, content: &[u8]) -> Vec<u8> {
    let content = pdf.add_stream("", content);
    let page = pdf.add(format!(
        "<< /Type /Page /Resources << /Font << /F1 {font} 0 R >> >> /Contents {content} 0 R >>"
    ));
    let tree = pdf.add(format!("<< /Type /Pages /Kids [{page} 0 R] >>"));
    let catalog = pdf.add(format!("<< /Type /Catalog /Pages {tree} 0 R >>"));
    pdf.build(catalog, None)
}

#[test]
fn test_win_ansi_high_codes() {
    let mut pdf = PdfBuilder::new();
    let font = pdf.add("<< /Type /Font /Subtype /TrueType /BaseFont /Arial /Encoding /WinAnsiEncoding >>");
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf <43616699> Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "Caf\u{2122}");
}

#[test]
fn test_mac_roman_encoding() {
    let mut pdf = PdfBuilder::new();
    let font = pdf.add("<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman /Encoding /MacRomanEncoding >>");
    // 0x8E is e-acute in MacRoman.
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf <8E7465> Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "\u{e9}te");
}

#[test]
fn test_differences_array() {
    let mut pdf = PdfBuilder::new();
    let encoding = pdf.add("<< /Type /Encoding /BaseEncoding /WinAnsiEncoding /Differences [1 /H /e /l /l.alt /o 200 /uni263A] >>");
    let font = pdf.add(format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Custom /Encoding {encoding} 0 R >>"
    ));
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf <0102030405C8> Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "Hello\u{263a}");
}

#[test]
fn test_to_unicode_overrides_encoding() {
    let mut pdf = PdfBuilder::new();
    let cmap = pdf.add_flate_stream(
        "",
        b"/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
          1 begincodespacerange <00> <FF> endcodespacerange\n\
          2 beginbfchar <41> <03A9> <42> <00660069> endbfchar\n\
          1 beginbfrange <61> <63> <0061> endbfrange\n\
          endcmap\nend\nend\n",
    );
    let font = pdf.add(format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Symbolic /ToUnicode {cmap} 0 R >>"
    ));
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf (ABabcZ) Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    // Codes outside the map fall back to the encoding.
    assert_eq!(result.pages[0].text, "\u{3a9}fiabcZ");
}

#[test]
fn test_type0_font_with_to_unicode() {
    let mut pdf = PdfBuilder::new();
    let cmap = pdf.add_stream(
        "",
        b"begincmap\n1 begincodespacerange <0000> <FFFF> endcodespacerange\n\
          2 beginbfchar <0003> <0048> <0004> <0069> endbfchar\n\
          1 beginbfrange <0010> <0012> [<4E2D> <6587> <5B57>] endbfrange\nendcmap\n",
    );
    let font = pdf.add(format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /NotoSansCJK /Encoding /Identity-H /ToUnicode {cmap} 0 R >>"
    ));
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf <00030004> Tj <001000110012> Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "Hi\u{4e2d}\u{6587}\u{5b57}");
}

#[test]
fn test_type0_font_without_map_reads_identity() {
    let mut pdf = PdfBuilder::new();
    let font = pdf.add("<< /Type /Font /Subtype /Type0 /BaseFont /Unknown /Encoding /Identity-H >>");
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf <00410042> Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "AB");
}

#[test]
fn test_word_gaps_in_tj_arrays() {
    let mut pdf = PdfBuilder::new();
    let font = pdf.add("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf [(Kern) 30 (ing) -250 (gap)] TJ ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "Kerning gap");
}

#[test]
fn test_broken_to_unicode_falls_back() {
    let mut pdf = PdfBuilder::new();
    let font = pdf.add("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /ToUnicode 77 0 R >>");
    let bytes = page_with_font(&mut pdf, font, b"BT /F1 12 Tf (plain) Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "plain");
}

#[test]
fn test_unknown_font_name_is_a_warning() {
    let mut pdf = PdfBuilder::new();
    let font = pdf.add("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    let bytes = page_with_font(&mut pdf, font, b"BT /F7 12 Tf (still shown) Tj ET");
    let result = parse_bytes(&bytes).unwrap();
    assert_eq!(result.pages[0].text, "still shown");
    assert!(result.warnings.iter().any(|w| w.contains("/F7")));
}
