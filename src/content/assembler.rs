//! Turns interpreted runs into page text.

use unicode_normalization::UnicodeNormalization;

use crate::model::SimpleEncoding;

use super::interpreter::TextRun;

/// Decode and join `runs`.
///
/// Bytes go through the run's font; runs without a usable font fall back
/// to the default Latin mapping. Line breaks never stack up into blank
/// lines and word breaks never double a space.
pub fn assemble(runs: &[TextRun]) -> String {
    let latin = SimpleEncoding::default();
    let mut text = String::new();

    for run in runs {
        match run {
            TextRun::Show { font, bytes, .. } => {
                let decoded = match font {
                    Some(font) => font.decode(bytes),
                    None => latin.decode_bytes(bytes),
                };
                text.extend(
                    decoded
                        .chars()
                        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t'),
                );
            }
            TextRun::LineBreak => {
                let kept = text.trim_end_matches(' ').len();
                text.truncate(kept);
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            TextRun::WordBreak => {
                if !text.is_empty() && !text.ends_with(|c: char| c == ' ' || c == '\n') {
                    text.push(' ');
                }
            }
        }
    }

    text.trim().nfc().collect()
}

/// A page is image-only when nothing but whitespace was recovered.
pub fn is_image_only(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FontDescriptor;
    use std::sync::Arc;

    fn show(text: &str) -> TextRun {
        TextRun::Show {
            font_name: None,
            font: None,
            bytes: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_plain_runs_concatenate() {
        let runs = vec![show("Hel"), show("lo")];
        assert_eq!(assemble(&runs), "Hello");
    }

    #[test]
    fn test_breaks_collapse() {
        let runs = vec![
            TextRun::LineBreak,
            show("one "),
            TextRun::LineBreak,
            TextRun::LineBreak,
            show("two"),
            TextRun::WordBreak,
            TextRun::WordBreak,
            show("three"),
            TextRun::LineBreak,
        ];
        assert_eq!(assemble(&runs), "one\ntwo three");
    }

    #[test]
    fn test_default_mapping_is_latin() {
        let runs = vec![TextRun::Show {
            font_name: Some("F1".to_string()),
            font: None,
            bytes: vec![b'c', b'a', b'f', 0xE9, 0x93, b'x', 0x94],
        }];
        assert_eq!(assemble(&runs), "caf\u{e9}\u{201c}x\u{201d}");
    }

    #[test]
    fn test_control_bytes_are_dropped() {
        let runs = vec![TextRun::Show {
            font_name: None,
            font: None,
            bytes: vec![b'a', 0x01, b'b', 0x07],
        }];
        assert_eq!(assemble(&runs), "ab");
    }

    #[test]
    fn test_output_is_nfc() {
        let font = FontDescriptor {
            subtype: "Type0".to_string(),
            base_font: None,
            encoding: None,
            to_unicode: None,
            composite: true,
        };
        let runs = vec![TextRun::Show {
            font_name: Some("F1".to_string()),
            font: Some(Arc::new(font)),
            bytes: vec![0x00, b'e', 0x03, 0x01],
        }];
        assert_eq!(assemble(&runs), "\u{e9}");
    }

    #[test]
    fn test_is_image_only() {
        assert!(is_image_only(""));
        assert!(is_image_only(" \n\t"));
        assert!(!is_image_only(" a "));
    }
}
