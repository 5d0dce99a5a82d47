//! The extraction result handed back to callers.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

/// Everything extracted from one document.
///
/// Serializes to `{"metadata": {...}, "pages": [...], "warnings": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub metadata: Metadata,
    /// One entry per page, in page order.
    pub pages: Vec<PageText>,
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    /// Get a page by number (1-indexed).
    pub fn page(&self, number: u32) -> Option<&PageText> {
        number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
    }

    /// All page texts joined with blank lines.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Pages that yielded no text.
    pub fn image_only_pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages
            .iter()
            .filter(|page| page.text.trim().is_empty())
            .map(|page| page.page)
    }
}

/// Document metadata.
///
/// Absent and blank fields are both `None`, never an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Raw `/CreationDate` value, e.g. `D:20240131120000+01'00'`.
    pub creation_date: Option<String>,
    /// Number of pages found in the page tree.
    pub num_pages: u32,
}

impl Metadata {
    /// The creation date, when it parses as a PDF date.
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.creation_date.as_deref().and_then(parse_pdf_date)
    }
}

/// Text of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page: u32,
    pub text: String,
}

/// Parse a PDF date string: `D:YYYYMMDDHHmmSSOHH'mm'`.
///
/// Everything after the year is optional; a missing offset means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);
    let digits_len = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len < 4 {
        return None;
    }
    let (digits, rest) = s.split_at(digits_len);
    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(value) => value.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits[..4].parse().ok()?;
    let month = field(4, 1)?;
    let day = field(6, 1)?;
    let hour = field(8, 0)?;
    let minute = field(10, 0)?;
    // Leap seconds are clamped.
    let second = field(12, 0)?.min(59);

    let offset = FixedOffset::east_opt(parse_offset(rest))?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_offset(rest: &str) -> i32 {
    let mut chars = rest.chars();
    let sign = match chars.next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return 0,
    };
    let digits: String = chars.filter(char::is_ascii_digit).collect();
    let hours: i32 = digits.get(0..2).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i32 = digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    sign * (hours * 3600 + minutes * 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_full_pdf_date() {
        let date = parse_pdf_date("D:20240131123045+01'30'").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 31));
        assert_eq!((date.hour(), date.minute(), date.second()), (12, 30, 45));
        assert_eq!(date.offset().local_minus_utc(), 5400);
    }

    #[test]
    fn test_parse_partial_pdf_date() {
        let date = parse_pdf_date("D:2023").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2023, 1, 1));
        assert_eq!(date.offset().local_minus_utc(), 0);

        let date = parse_pdf_date("20230615Z").unwrap();
        assert_eq!(date.month(), 6);
        assert_eq!(date.day(), 15);
    }

    #[test]
    fn test_reject_bad_dates() {
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("D:20241345").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let result = ExtractionResult {
            metadata: Metadata {
                title: None,
                author: Some("Ann".to_string()),
                creation_date: None,
                num_pages: 1,
            },
            pages: vec![PageText {
                page: 1,
                text: "Hello".to_string(),
            }],
            warnings: vec![],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "metadata": {"title": null, "author": "Ann", "creation_date": null, "num_pages": 1},
                "pages": [{"page": 1, "text": "Hello"}],
                "warnings": []
            })
        );
    }

    #[test]
    fn test_image_only_pages_and_lookup() {
        let result = ExtractionResult {
            metadata: Metadata::default(),
            pages: vec![
                PageText {
                    page: 1,
                    text: "a".to_string(),
                },
                PageText {
                    page: 2,
                    text: "  ".to_string(),
                },
            ],
            warnings: vec![],
        };
        assert_eq!(result.image_only_pages().collect::<Vec<_>>(), vec![2]);
        assert_eq!(result.page(1).map(|p| p.text.as_str()), Some("a"));
        assert!(result.page(0).is_none());
    }
}
