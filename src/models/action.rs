use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Regex marking an OCR action converted from the old region-only tuple.
///
/// A `Numbers` action carrying exactly this pattern keeps the old
/// nine-digit extraction, including its zero padding.
pub const LEGACY_ID_PATTERN: &str = r"\b(\d{9})\b";

/// Smallest capturable side of a region, in pixels.
pub const MIN_REGION_SIDE: u32 = 1;

/// A screen rectangle as recorded: two opposite corners in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Normalize to `(left, top, width, height)` regardless of corner order.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            left: self.x1.min(self.x2),
            top: self.y1.min(self.y2),
            width: self.x1.abs_diff(self.x2),
            height: self.y1.abs_diff(self.y2),
        }
    }
}

impl From<[i32; 4]> for Region {
    fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<Region> for [i32; 4] {
    fn from(r: Region) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

/// Normalized capture rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn is_capturable(&self) -> bool {
        self.width >= MIN_REGION_SIDE && self.height >= MIN_REGION_SIDE
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + (self.width / 2) as i32,
            self.top + (self.height / 2) as i32,
        )
    }
}

/// Which substrings of recognized text count as matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    #[default]
    AllText,
    Numbers,
    Email,
    Custom,
}

impl OcrMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrMode::AllText => "all_text",
            OcrMode::Numbers => "numbers",
            OcrMode::Email => "email",
            OcrMode::Custom => "custom",
        }
    }
}

/// How extracted matches are reduced and consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Processing {
    #[default]
    Copy,
    Show,
    FirstMatch,
    CopyAllJoined,
}

impl Processing {
    /// Whether the selected value ends up on the clipboard.
    pub fn writes_clipboard(&self) -> bool {
        !matches!(self, Processing::Show)
    }
}

/// Read a screen region through OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRead {
    pub region: Region,
    #[serde(default)]
    pub mode: OcrMode,
    /// Required for `Custom`; an override for the other modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub processing: Processing,
}

impl OcrRead {
    /// The current form of an old region-only OCR action.
    pub fn legacy(region: Region) -> Self {
        Self {
            region,
            mode: OcrMode::Numbers,
            pattern: Some(LEGACY_ID_PATTERN.to_string()),
            processing: Processing::Copy,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.mode == OcrMode::Numbers && self.pattern.as_deref() == Some(LEGACY_ID_PATTERN)
    }
}

/// Branch on whether a screen region looks like a reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCheck {
    pub reference_image: PathBuf,
    pub region: Region,
    pub threshold: f64,
    #[serde(default)]
    pub match_actions: Vec<Action>,
    #[serde(default)]
    pub wait_until_found: bool,
    /// Seconds between polls; `None` uses the runner default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<f64>,
    /// Seconds to keep polling; 0 means the runner's maximum wait.
    #[serde(default)]
    pub timeout: f64,
}

/// One macro step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click {
        x: i32,
        y: i32,
    },
    Drag {
        from: (i32, i32),
        to: (i32, i32),
    },
    Delay {
        seconds: f64,
    },
    Copy,
    Paste,
    Hotkey {
        keys: Vec<String>,
    },
    Key {
        key: String,
        #[serde(default = "default_key_count")]
        count: u32,
        #[serde(default)]
        interval: f64,
    },
    Ocr(OcrRead),
    ImgCheck(ImageCheck),
    /// Click the centre of the region matched by the enclosing image check.
    ClickFound,
}

fn default_key_count() -> u32 {
    1
}

impl Action {
    pub fn click(x: i32, y: i32) -> Self {
        Action::Click { x, y }
    }

    pub fn drag(from: (i32, i32), to: (i32, i32)) -> Self {
        Action::Drag { from, to }
    }

    pub fn delay(seconds: f64) -> Self {
        Action::Delay { seconds }
    }

    pub fn hotkey<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Action::Hotkey {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Drag { .. } => "drag",
            Action::Delay { .. } => "delay",
            Action::Copy => "copy",
            Action::Paste => "paste",
            Action::Hotkey { .. } => "hotkey",
            Action::Key { .. } => "key",
            Action::Ocr(_) => "ocr",
            Action::ImgCheck(_) => "img_check",
            Action::ClickFound => "click_found",
        }
    }

    /// Nested actions of a branch, empty for everything else.
    pub fn children(&self) -> &[Action] {
        match self {
            Action::ImgCheck(check) => &check.match_actions,
            _ => &[],
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Action::ImgCheck(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { x, y } => write!(f, "Click at ({}, {})", x, y),
            Action::Drag { from, to } => write!(
                f,
                "Drag from ({}, {}) to ({}, {})",
                from.0, from.1, to.0, to.1
            ),
            Action::Delay { seconds } => write!(f, "Delay {:.2}s", seconds),
            Action::Copy => write!(f, "Copy"),
            Action::Paste => write!(f, "Paste"),
            Action::Hotkey { keys } => write!(f, "Hotkey: {}", keys.join(" + ")),
            Action::Key {
                key,
                count,
                interval,
            } => write!(f, "Key: {} x{} (interval {:.2}s)", key, count, interval),
            Action::Ocr(read) => {
                let b = read.region.bounds();
                write!(
                    f,
                    "OCR ({}) {}x{} at ({}, {})",
                    read.mode.as_str(),
                    b.width,
                    b.height,
                    b.left,
                    b.top
                )
            }
            Action::ImgCheck(check) => {
                let name = check
                    .reference_image
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| check.reference_image.display().to_string());
                write!(
                    f,
                    "Image check: {}{} ({} sub-actions)",
                    name,
                    if check.wait_until_found {
                        " (wait until found)"
                    } else {
                        ""
                    },
                    check.match_actions.len()
                )
            }
            Action::ClickFound => write!(f, "Click found image"),
        }
    }
}

/// Position of an action in the program tree: 0-based index per level.
///
/// Displayed 1-based and dotted, so `[2, 0]` reads `3.1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionPath(pub Vec<usize>);

impl ActionPath {
    pub fn root(index: usize) -> Self {
        ActionPath(vec![index])
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        ActionPath(path)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ActionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| (i + 1).to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_region_normalization_ignores_corner_order() {
        let expected = Bounds {
            left: 10,
            top: 20,
            width: 90,
            height: 40,
        };

        assert_eq!(Region::new(10, 20, 100, 60).bounds(), expected);
        assert_eq!(Region::new(100, 60, 10, 20).bounds(), expected);
        assert_eq!(Region::new(10, 60, 100, 20).bounds(), expected);
        assert_eq!(Region::new(100, 20, 10, 60).bounds(), expected);
    }

    #[test]
    fn test_zero_area_region_is_not_capturable() {
        assert!(!Region::new(5, 5, 5, 50).bounds().is_capturable());
        assert!(!Region::new(5, 5, 50, 5).bounds().is_capturable());
        assert!(Region::new(5, 5, 6, 6).bounds().is_capturable());
    }

    #[test]
    fn test_tagged_serialization() {
        let action = Action::Ocr(OcrRead {
            region: Region::new(0, 0, 50, 20),
            mode: OcrMode::Email,
            pattern: None,
            processing: Processing::CopyAllJoined,
        });

        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ocr",
                "region": [0, 0, 50, 20],
                "mode": "email",
                "processing": "copy_all_joined"
            })
        );

        let back: Action = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_unit_variants_and_defaults() {
        let copy: Action = serde_json::from_value(json!({ "type": "copy" })).unwrap();
        assert_eq!(copy, Action::Copy);

        let key: Action = serde_json::from_value(json!({ "type": "key", "key": "tab" })).unwrap();
        assert_eq!(
            key,
            Action::Key {
                key: "tab".into(),
                count: 1,
                interval: 0.0
            }
        );
    }

    #[test]
    fn test_legacy_ocr_shape() {
        let read = OcrRead::legacy(Region::new(1, 2, 3, 4));
        assert_eq!(read.mode, OcrMode::Numbers);
        assert_eq!(read.processing, Processing::Copy);
        assert!(read.is_legacy());
    }

    #[test]
    fn test_action_path_display() {
        let path = ActionPath::root(2).child(0);
        assert_eq!(path.to_string(), "3.1");
        assert_eq!(path.depth(), 2);
    }
}
