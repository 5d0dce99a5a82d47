//! Synthetic PDF files for the integration tests.
#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

enum Body {
    Plain(String),
    Stream { dict: String, data: Vec<u8> },
}

/// Writes a PDF from numbered object bodies.
///
/// Object numbers are handed out in order starting at 1. Bodies are the
/// text between `N 0 obj` and `endobj`.
#[derive(Default)]
pub struct PdfBuilder {
    objects: Vec<Option<Body>>,
    compressed: Vec<u32>,
    broken_offsets: bool,
    without_xref: bool,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an object number to fill in later with [`set`](Self::set).
    pub fn reserve(&mut self) -> u32 {
        self.objects.push(None);
        self.objects.len() as u32
    }

    pub fn set(&mut self, id: u32, body: impl Into<String>) {
        self.objects[id as usize - 1] = Some(Body::Plain(body.into()));
    }

    pub fn add(&mut self, body: impl Into<String>) -> u32 {
        let id = self.reserve();
        self.set(id, body);
        id
    }

    /// Add a stream; `dict` holds extra entries besides `/Length`.
    pub fn add_stream(&mut self, dict: &str, data: &[u8]) -> u32 {
        let id = self.reserve();
        self.objects[id as usize - 1] = Some(Body::Stream {
            dict: dict.to_string(),
            data: data.to_vec(),
        });
        id
    }

    /// Add a FlateDecode-compressed stream.
    pub fn add_flate_stream(&mut self, dict: &str, data: &[u8]) -> u32 {
        self.add_stream(&format!("/Filter /FlateDecode {dict}"), &deflate(data))
    }

    /// Store these (non-stream) objects in an object stream. Only honored
    /// by [`build_with_xref_stream`](Self::build_with_xref_stream).
    pub fn compress(&mut self, ids: &[u32]) {
        self.compressed.extend_from_slice(ids);
    }

    /// Write every xref offset three bytes past the real object header.
    pub fn with_broken_offsets(mut self) -> Self {
        self.broken_offsets = true;
        self
    }

    /// Leave the cross-reference section out; `startxref` points at 0.
    pub fn without_xref(mut self) -> Self {
        self.without_xref = true;
        self
    }

    /// Write the file with a classic `xref` table.
    pub fn build(&self, root: u32, info: Option<u32>) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let offsets = self.write_objects(&mut out, &[]);
        let size = self.objects.len() + 1;
        let info = info.map(|id| format!(" /Info {id} 0 R")).unwrap_or_default();

        if self.without_xref {
            out.extend_from_slice(
                format!("trailer\n<< /Size {size} /Root {root} 0 R{info} >>\nstartxref\n0\n%%EOF\n").as_bytes(),
            );
            return out;
        }

        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in offsets {
            let offset = offset.expect("classic files hold no compressed objects");
            let offset = if self.broken_offsets { offset + 3 } else { offset };
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {size} /Root {root} 0 R{info} >>\nstartxref\n{xref_at}\n%%EOF\n")
                .as_bytes(),
        );
        out
    }

    /// Write the file with a cross-reference stream, packing the objects
    /// named in [`compress`](Self::compress) into one object stream.
    pub fn build_with_xref_stream(&self, root: u32, info: Option<u32>) -> Vec<u8> {
        let mut out = b"%PDF-1.5\n".to_vec();
        let mut offsets = self.write_objects(&mut out, &self.compressed);

        let mut compressed_index = Vec::new();
        if !self.compressed.is_empty() {
            let stream_id = self.objects.len() as u32 + 1;
            let mut header = String::new();
            let mut body = String::new();
            for (index, &id) in self.compressed.iter().enumerate() {
                let Some(Body::Plain(text)) = &self.objects[id as usize - 1] else {
                    panic!("only plain objects can be compressed");
                };
                header.push_str(&format!("{id} {} ", body.len()));
                body.push_str(text);
                body.push('\n');
                compressed_index.push((id, stream_id, index as u32));
            }
            let data = format!("{header}\n{body}");
            let first = header.len() + 1;
            offsets.push(Some(out.len()));
            let packed = deflate(data.as_bytes());
            out.extend_from_slice(
                format!(
                    "{stream_id} 0 obj\n<< /Type /ObjStm /N {} /First {first} /Filter /FlateDecode /Length {} >>\nstream\n",
                    self.compressed.len(),
                    packed.len()
                )
                .as_bytes(),
            );
            out.extend_from_slice(&packed);
            out.extend_from_slice(b"\nendstream\nendobj\n");
        }

        let xref_id = offsets.len() as u32 + 1;
        let xref_at = out.len();
        offsets.push(Some(xref_at));

        let mut rows = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
        for (i, offset) in offsets.iter().enumerate() {
            let id = i as u32 + 1;
            match offset {
                Some(offset) => {
                    rows.push(1);
                    rows.extend_from_slice(&(*offset as u32).to_be_bytes());
                    rows.extend_from_slice(&[0, 0]);
                }
                None => {
                    let &(_, stream_id, index) = compressed_index
                        .iter()
                        .find(|(compressed, _, _)| *compressed == id)
                        .expect("every object has an entry");
                    rows.push(2);
                    rows.extend_from_slice(&stream_id.to_be_bytes());
                    rows.extend_from_slice(&(index as u16).to_be_bytes());
                }
            }
        }

        let info = info.map(|id| format!(" /Info {id} 0 R")).unwrap_or_default();
        out.extend_from_slice(
            format!(
                "{xref_id} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root {root} 0 R{info} /Length {} >>\nstream\n",
                xref_id + 1,
                rows.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref_at}\n%%EOF\n").as_bytes());
        out
    }

    /// Write all objects not in `skip`; returns each object's offset, or
    /// `None` for skipped ones.
    fn write_objects(&self, out: &mut Vec<u8>, skip: &[u32]) -> Vec<Option<usize>> {
        let mut offsets = Vec::with_capacity(self.objects.len());
        for (i, body) in self.objects.iter().enumerate() {
            let id = i as u32 + 1;
            if skip.contains(&id) {
                offsets.push(None);
                continue;
            }
            offsets.push(Some(out.len()));
            out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
            match body.as_ref().expect("reserved object was never set") {
                Body::Plain(text) => out.extend_from_slice(text.as_bytes()),
                Body::Stream { dict, data } => {
                    out.extend_from_slice(format!("<< /Length {} {dict} >>\nstream\n", data.len()).as_bytes());
                    out.extend_from_slice(data);
                    out.extend_from_slice(b"\nendstream");
                }
            }
            out.extend_from_slice(b"\nendobj\n");
        }
        offsets
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Escape text for a literal string operand.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Content showing each line with `/F1`, one line below the other.
pub fn text_content(lines: &[&str]) -> String {
    let mut content = String::from("BT\n/F1 12 Tf\n72 720 Td\n");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str("0 -14 Td\n");
        }
        content.push_str(&format!("({}) Tj\n", escape(line)));
    }
    content.push_str("ET\n");
    content
}

/// Content that paints a rectangle and shows no text.
pub const BLANK_CONTENT: &str = "0.5 g\n72 72 200 200 re f\n";

/// A document with one page per entry. Empty entries become pages
/// without text. Returns the builder, the catalog id and the info id.
pub fn text_document(pages: &[&str], info: Option<&str>) -> (PdfBuilder, u32, Option<u32>) {
    let mut pdf = PdfBuilder::new();
    let catalog = pdf.reserve();
    let tree = pdf.reserve();
    let font = pdf.add("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>");

    let mut kids = Vec::new();
    for text in pages {
        let content = if text.is_empty() {
            BLANK_CONTENT.to_string()
        } else {
            text_content(&text.lines().collect::<Vec<_>>())
        };
        let contents = pdf.add_flate_stream("", content.as_bytes());
        let page = pdf.add(format!(
            "<< /Type /Page /Parent {tree} 0 R /Resources << /Font << /F1 {font} 0 R >> >> /Contents {contents} 0 R >>"
        ));
        kids.push(format!("{page} 0 R"));
    }

    pdf.set(catalog, format!("<< /Type /Catalog /Pages {tree} 0 R >>"));
    pdf.set(
        tree,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>",
            kids.join(" "),
            kids.len()
        ),
    );
    let info = info.map(|body| pdf.add(body));
    (pdf, catalog, info)
}

/// Shorthand for a classic-xref text document without metadata.
pub fn simple_pdf(pages: &[&str]) -> Vec<u8> {
    let (pdf, root, info) = text_document(pages, None);
    pdf.build(root, info)
}

/// Offset named by the last `startxref`.
pub fn last_startxref(pdf: &[u8]) -> usize {
    let text = String::from_utf8_lossy(pdf);
    let at = text.rfind("startxref").expect("file has a startxref");
    text[at + "startxref".len()..]
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .expect("startxref is followed by a number")
}

/// Append an incremental update redefining `objects`.
pub fn append_update(base: &[u8], objects: &[(u32, String)], root: u32, size: u32) -> Vec<u8> {
    let prev = last_startxref(base);
    let mut out = base.to_vec();
    let mut entries = Vec::new();
    for (id, body) in objects {
        entries.push((*id, out.len()));
        out.extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(b"xref\n");
    for (id, offset) in entries {
        out.extend_from_slice(format!("{id} 1\n{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root {root} 0 R /Prev {prev} >>\nstartxref\n{xref_at}\n%%EOF\n")
            .as_bytes(),
    );
    out
}
