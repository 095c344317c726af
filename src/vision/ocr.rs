//! Turning raw OCR text into matches, and driving the engine's retries

use image::RgbaImage;
use regex::Regex;

use crate::desktop::{OcrEngine, PageSegmentation};
use crate::error::SensorError;
use crate::models::{OcrMode, OcrRead, Processing};

const NUMBERS_PATTERN: &str = r"\d+";
const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b";

/// Matches found in recognized text and the value chosen from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub matches: Vec<String>,
    /// Empty when there were no matches.
    pub selected: String,
    /// Set when the pattern could not be used; the result is then empty.
    pub warning: Option<SensorError>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Extract matches from `raw` according to the read's mode and reduce them.
///
/// Never fails: a bad pattern yields an empty result carrying a warning.
pub fn extract(
    raw: &str,
    mode: OcrMode,
    pattern: Option<&str>,
    processing: Processing,
) -> ExtractionResult {
    let pattern = pattern.filter(|p| !p.is_empty());

    let found = match (mode, pattern) {
        (OcrMode::AllText, None) => {
            let text = raw.trim();
            Ok(if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            })
        }
        (OcrMode::Numbers, None) => find_all(raw, NUMBERS_PATTERN),
        (OcrMode::Email, None) => find_all(raw, EMAIL_PATTERN),
        (OcrMode::Custom, None) => Err(SensorError::InvalidPattern {
            pattern: String::new(),
            reason: "custom mode needs a pattern".into(),
        }),
        (_, Some(pattern)) => find_all(raw, pattern),
    };

    match found {
        Ok(matches) => {
            let selected = select(&matches, processing);
            ExtractionResult {
                matches,
                selected,
                warning: None,
            }
        }
        Err(warning) => ExtractionResult {
            warning: Some(warning),
            ..Default::default()
        },
    }
}

/// Extraction for an [`OcrRead`], including the legacy nine-digit cascade.
pub fn extract_for(read: &OcrRead, raw: &str) -> ExtractionResult {
    if read.is_legacy() {
        let matches: Vec<String> = legacy_id(raw).into_iter().collect();
        let selected = select(&matches, read.processing);
        return ExtractionResult {
            matches,
            selected,
            warning: None,
        };
    }
    extract(raw, read.mode, read.pattern.as_deref(), read.processing)
}

fn find_all(raw: &str, pattern: &str) -> Result<Vec<String>, SensorError> {
    let re = Regex::new(pattern).map_err(|e| SensorError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    // With a capture group only the first group is reported.
    let group = usize::from(re.captures_len() > 1);
    Ok(re
        .captures_iter(raw)
        .filter_map(|caps| caps.get(group).map(|m| m.as_str().to_string()))
        .collect())
}

fn select(matches: &[String], processing: Processing) -> String {
    match processing {
        Processing::CopyAllJoined => matches.join(" "),
        Processing::Copy | Processing::Show | Processing::FirstMatch => {
            matches.first().cloned().unwrap_or_default()
        }
    }
}

/// First standalone nine-digit run, else an 8, 7 or 6 digit run left-padded
/// with zeros to nine digits.
fn legacy_id(raw: &str) -> Option<String> {
    (6..=9).rev().find_map(|width| {
        let re = Regex::new(&format!(r"\b(\d{{{}}})\b", width)).ok()?;
        re.captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| format!("{:0>9}", m.as_str()))
    })
}

/// Run OCR trying each segmentation in [`PageSegmentation::FALLBACK_ORDER`].
///
/// Stops at the first attempt producing a non-empty line. If every attempt
/// is empty the last result is returned; only when all of them error is the
/// last error returned.
pub fn recognize_with_fallback(
    engine: &dyn OcrEngine,
    image: &RgbaImage,
) -> Result<String, SensorError> {
    let mut last_ok: Option<String> = None;
    let mut last_err: Option<SensorError> = None;

    for segmentation in PageSegmentation::FALLBACK_ORDER {
        match engine.recognize(image, segmentation) {
            Ok(text) => {
                if text.lines().any(|line| !line.trim().is_empty()) {
                    return Ok(text.trim().to_string());
                }
                last_ok = Some(text);
            }
            Err(e) => {
                tracing::debug!("OCR with psm {} failed: {}", segmentation.psm(), e);
                last_err = Some(e);
            }
        }
    }

    match (last_ok, last_err) {
        (Some(text), _) => Ok(text.trim().to_string()),
        (None, Some(err)) => Err(err),
        (None, None) => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Region;
    use std::sync::Mutex;

    #[test]
    fn test_numbers_mode_and_processing() {
        let text = "id 482910733 ref 22";

        let first = extract(text, OcrMode::Numbers, None, Processing::FirstMatch);
        assert_eq!(first.matches, vec!["482910733", "22"]);
        assert_eq!(first.selected, "482910733");

        let all = extract(text, OcrMode::Numbers, None, Processing::CopyAllJoined);
        assert_eq!(all.selected, "482910733 22");
    }

    #[test]
    fn test_email_mode() {
        let result = extract(
            "contact a@b.com or c@d.org",
            OcrMode::Email,
            None,
            Processing::Copy,
        );
        assert_eq!(result.matches, vec!["a@b.com", "c@d.org"]);
        assert_eq!(result.selected, "a@b.com");
    }

    #[test]
    fn test_all_text_is_trimmed() {
        let result = extract("  Hello\nWorld \n", OcrMode::AllText, None, Processing::Show);
        assert_eq!(result.matches, vec!["Hello\nWorld"]);

        let empty = extract("   \n", OcrMode::AllText, None, Processing::Copy);
        assert!(empty.is_empty());
        assert_eq!(empty.selected, "");
    }

    #[test]
    fn test_invalid_custom_pattern_is_a_warning() {
        let result = extract("abc", OcrMode::Custom, Some("(unbalanced"), Processing::Copy);
        assert!(result.matches.is_empty());
        assert!(result.selected.is_empty());
        assert!(matches!(
            result.warning,
            Some(SensorError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_custom_pattern_reports_first_group() {
        let result = extract(
            "order #A-17, order #B-4",
            OcrMode::Custom,
            Some(r"#([A-Z]-\d+)"),
            Processing::CopyAllJoined,
        );
        assert_eq!(result.matches, vec!["A-17", "B-4"]);
        assert_eq!(result.selected, "A-17 B-4");
    }

    #[test]
    fn test_pattern_overrides_builtin_mode() {
        let result = extract("x 12 y 345", OcrMode::Numbers, Some(r"\d{3}"), Processing::Copy);
        assert_eq!(result.matches, vec!["345"]);
    }

    #[test]
    fn test_legacy_read_pads_short_ids() {
        let read = OcrRead::legacy(Region::new(0, 0, 10, 10));

        assert_eq!(extract_for(&read, "ID 123456789 x").selected, "123456789");
        assert_eq!(extract_for(&read, "ID 1234567 x").selected, "001234567");
        assert_eq!(extract_for(&read, "ID 123456").selected, "000123456");
        assert!(extract_for(&read, "ID 12345").is_empty());
    }

    #[test]
    fn test_padding_only_on_legacy_path() {
        let read = OcrRead {
            region: Region::new(0, 0, 10, 10),
            mode: OcrMode::Numbers,
            pattern: None,
            processing: Processing::Copy,
        };
        assert_eq!(extract_for(&read, "ID 1234567").selected, "1234567");
    }

    struct ScriptedOcr {
        replies: Mutex<Vec<Result<String, SensorError>>>,
        seen: Mutex<Vec<u8>>,
    }

    impl ScriptedOcr {
        fn new(mut replies: Vec<Result<String, SensorError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(
            &self,
            _image: &RgbaImage,
            segmentation: PageSegmentation,
        ) -> Result<String, SensorError> {
            self.seen.lock().unwrap().push(segmentation.psm());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[test]
    fn test_fallback_stops_at_first_text() {
        let engine = ScriptedOcr::new(vec![
            Ok("  \n".into()),
            Err(SensorError::Ocr("boom".into())),
            Ok("hello\n".into()),
        ]);
        let text = recognize_with_fallback(&engine, &RgbaImage::new(1, 1)).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(*engine.seen.lock().unwrap(), vec![6, 7, 8]);
    }

    #[test]
    fn test_fallback_accepts_empty_last_result() {
        let engine = ScriptedOcr::new(vec![]);
        let text = recognize_with_fallback(&engine, &RgbaImage::new(1, 1)).unwrap();
        assert_eq!(text, "");
        assert_eq!(engine.seen.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_fallback_errors_when_every_attempt_fails() {
        let engine = ScriptedOcr::new(
            (0..5)
                .map(|i| Err(SensorError::Ocr(format!("fail {}", i))))
                .collect(),
        );
        let err = recognize_with_fallback(&engine, &RgbaImage::new(1, 1)).unwrap_err();
        assert_eq!(err, SensorError::Ocr("fail 4".into()));
    }
}
