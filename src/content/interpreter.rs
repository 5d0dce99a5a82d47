//! Content stream interpreter.
//!
//! Runs the text-showing subset of the operator language and records what
//! was shown, in order, with the font that was current at the time.
//! Positioning operators only matter as far as they imply a new line or a
//! gap between words; everything else is skipped.

use std::sync::Arc;

use crate::model::{Document, FontDescriptor, Page, Resources};
use crate::parser::lexer::Token;
use crate::parser::{ObjectId, ObjectReader, PdfObject};

/// `TJ` adjustments below this (in thousandths of text space) read as a
/// word gap.
const WORD_GAP_THRESHOLD: f64 = -200.0;

/// One step of recovered text.
#[derive(Debug, Clone)]
pub enum TextRun {
    /// Bytes shown by `Tj`, `TJ`, `'` or `"`.
    Show {
        font_name: Option<String>,
        font: Option<Arc<FontDescriptor>>,
        bytes: Vec<u8>,
    },
    LineBreak,
    WordBreak,
}

/// Runs and page-scoped warnings for one page.
#[derive(Debug, Clone, Default)]
pub struct PageRuns {
    pub runs: Vec<TextRun>,
    pub warnings: Vec<String>,
}

/// Interpret the content streams of `page`.
///
/// An unresolvable stream is skipped; a stream that cannot be decoded
/// leaves the whole page empty. Both are reported as warnings.
pub fn extract_runs(document: &Document<'_>, page: &Page, max_form_depth: u8) -> PageRuns {
    let mut warnings = page.warnings.clone();
    let mut data = Vec::new();

    for &(num, gen) in &page.contents {
        let object = match document.resolver().resolve((num, gen)) {
            Ok(object) => object,
            Err(err) => {
                log::warn!("Page {}: content stream {} {} R skipped: {}", page.index, num, gen, err);
                warnings.push(format!(
                    "Page {}: content stream {num} {gen} R skipped: {err}",
                    page.index
                ));
                continue;
            }
        };
        let Some(stream) = object.as_stream() else {
            warnings.push(format!(
                "Page {}: content {num} {gen} R is a {}, not a stream",
                page.index,
                object.type_name()
            ));
            continue;
        };
        match stream.decode() {
            Ok(bytes) => {
                if !data.is_empty() {
                    data.push(b'\n');
                }
                data.extend_from_slice(&bytes);
            }
            Err(err) => {
                log::warn!("Page {}: content cannot be decoded: {}", page.index, err);
                warnings.push(format!(
                    "Page {}: content stream cannot be decoded ({err}); page text left empty",
                    page.index
                ));
                return PageRuns {
                    runs: Vec::new(),
                    warnings,
                };
            }
        }
    }

    let mut interpreter = Interpreter::new(Some(document), page.index, max_form_depth);
    if let Some(id) = page.id {
        interpreter.forms.push(id);
    }
    interpreter.run(&data, &page.resources, TextState::default(), 0);
    warnings.append(&mut interpreter.warnings);
    PageRuns {
        runs: interpreter.runs,
        warnings,
    }
}

/// Interpret decoded content on its own. Form XObjects cannot be followed
/// without a document, so `Do` is ignored.
pub fn interpret_content(data: &[u8], resources: &Resources) -> PageRuns {
    let mut interpreter = Interpreter::new(None, 0, 0);
    interpreter.run(data, resources, TextState::default(), 0);
    PageRuns {
        runs: interpreter.runs,
        warnings: interpreter.warnings,
    }
}

/// The part of the graphics state that `q`/`Q` save for us.
#[derive(Debug, Clone, Default)]
struct TextState {
    font_name: Option<String>,
    font: Option<Arc<FontDescriptor>>,
}

struct Interpreter<'d, 'a> {
    document: Option<&'d Document<'a>>,
    page_index: u32,
    max_form_depth: u8,
    runs: Vec<TextRun>,
    warnings: Vec<String>,
    /// Forms (and the page) currently being executed.
    forms: Vec<ObjectId>,
    /// Vertical origin of the current text line, when known.
    line_y: Option<f64>,
}

impl<'d, 'a> Interpreter<'d, 'a> {
    fn new(document: Option<&'d Document<'a>>, page_index: u32, max_form_depth: u8) -> Self {
        Self {
            document,
            page_index,
            max_form_depth,
            runs: Vec::new(),
            warnings: Vec::new(),
            forms: Vec::new(),
            line_y: None,
        }
    }

    fn run(&mut self, data: &[u8], resources: &Resources, mut state: TextState, depth: u8) {
        let mut reader = ObjectReader::content(data);
        let mut operands: Vec<PdfObject> = Vec::new();
        let mut saved: Vec<TextState> = Vec::new();

        loop {
            let token = match reader.next_token() {
                Ok(Some(token)) => token,
                Ok(None) => break,
                Err(err) => {
                    self.damaged(err);
                    break;
                }
            };
            let Token::Keyword(op) = token else {
                match reader.parse_from(token) {
                    Ok(operand) => operands.push(operand),
                    Err(err) => {
                        self.damaged(err);
                        break;
                    }
                }
                continue;
            };

            match op.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        state = previous;
                    }
                }
                "Tf" => self.select_font(&operands, resources, &mut state),
                "Tj" => {
                    if let Some(bytes) = operands.first().and_then(PdfObject::as_string) {
                        self.show(&state, bytes);
                    }
                }
                "'" => {
                    self.runs.push(TextRun::LineBreak);
                    if let Some(bytes) = operands.first().and_then(PdfObject::as_string) {
                        self.show(&state, bytes);
                    }
                }
                "\"" => {
                    self.runs.push(TextRun::LineBreak);
                    if let Some(bytes) = operands.get(2).and_then(PdfObject::as_string) {
                        self.show(&state, bytes);
                    }
                }
                "TJ" => {
                    for item in operands.first().and_then(PdfObject::as_array).unwrap_or_default() {
                        match item {
                            PdfObject::String(bytes) => self.show(&state, bytes),
                            other => {
                                if other.as_f64().is_some_and(|n| n < WORD_GAP_THRESHOLD) {
                                    self.runs.push(TextRun::WordBreak);
                                }
                            }
                        }
                    }
                }
                "T*" => self.runs.push(TextRun::LineBreak),
                "Td" | "TD" => {
                    let ty = operands.get(1).and_then(PdfObject::as_f64).unwrap_or(0.0);
                    if ty != 0.0 {
                        self.runs.push(TextRun::LineBreak);
                    }
                    self.line_y = self.line_y.map(|y| y + ty);
                }
                "Tm" => {
                    if let Some(f) = operands.get(5).and_then(PdfObject::as_f64) {
                        if self.line_y.map_or(true, |y| (y - f).abs() > f64::EPSILON) {
                            self.runs.push(TextRun::LineBreak);
                        }
                        self.line_y = Some(f);
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(PdfObject::as_name) {
                        self.invoke_xobject(name, resources, &state, depth);
                    }
                }
                "BI" => skip_inline_image(&mut reader),
                _ => {}
            }
            operands.clear();
        }
    }

    fn damaged(&mut self, err: crate::error::Error) {
        log::warn!("Page {}: content stream is damaged: {}", self.page_index, err);
        self.warnings.push(format!(
            "Page {}: content stream is damaged ({err}); the rest of it was skipped",
            self.page_index
        ));
    }

    fn select_font(&mut self, operands: &[PdfObject], resources: &Resources, state: &mut TextState) {
        let Some(name) = operands.first().and_then(PdfObject::as_name) else {
            return;
        };
        state.font = resources.font(name).cloned();
        if state.font.is_none() {
            log::debug!("Page {}: font /{} is not in the resources", self.page_index, name);
            self.warnings.push(format!(
                "Page {}: font /{name} is not defined in the page resources",
                self.page_index
            ));
        }
        state.font_name = Some(name.to_string());
    }

    fn show(&mut self, state: &TextState, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.runs.push(TextRun::Show {
            font_name: state.font_name.clone(),
            font: state.font.clone(),
            bytes: bytes.to_vec(),
        });
    }

    /// Run a form XObject in its own resource scope. Images and other
    /// XObjects carry no text and are ignored.
    fn invoke_xobject(&mut self, name: &str, resources: &Resources, state: &TextState, depth: u8) {
        let Some(document) = self.document else {
            return;
        };
        let Some(id) = resources.xobject(name) else {
            return;
        };
        if self.forms.contains(&id) {
            self.warnings.push(format!(
                "Page {}: form XObject {} {} R invokes itself; skipped",
                self.page_index, id.0, id.1
            ));
            return;
        }
        if depth >= self.max_form_depth {
            self.warnings.push(format!(
                "Page {}: form XObjects nested deeper than {}; skipped",
                self.page_index, self.max_form_depth
            ));
            return;
        }

        let object = match document.resolver().resolve(id) {
            Ok(object) => object,
            Err(err) => {
                self.warnings
                    .push(format!("Page {}: XObject /{name} skipped: {err}", self.page_index));
                return;
            }
        };
        let Some(stream) = object.as_stream() else {
            return;
        };
        if stream.dict.get_name("Subtype") != Some("Form") {
            return;
        }
        let data = match stream.decode() {
            Ok(data) => data,
            Err(err) => {
                self.warnings.push(format!(
                    "Page {}: form XObject /{name} cannot be decoded: {err}",
                    self.page_index
                ));
                return;
            }
        };

        let own;
        let scope = match document.resolver().get_dict(&stream.dict, "Resources") {
            Ok(Some(dict)) => match dict.as_dict() {
                Some(dict) => {
                    let (loaded, mut warnings) = document.load_resources(dict);
                    self.warnings.append(&mut warnings);
                    own = loaded;
                    &own
                }
                None => resources,
            },
            _ => resources,
        };

        self.forms.push(id);
        self.run(&data, scope, state.clone(), depth + 1);
        self.forms.pop();
    }
}

/// Skip `BI <dict> ID <data> EI`; the `BI` operator has been read.
fn skip_inline_image(reader: &mut ObjectReader<'_, '_>) {
    loop {
        match reader.next_token() {
            Ok(Some(token)) if token.is_keyword("ID") => {
                reader.lexer_mut().skip_inline_image_data();
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return,
        }
    }
}
