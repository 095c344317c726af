//! Desktop collaborators used by the macro runner
//!
//! The runner never talks to the OS directly. Everything that touches the
//! pointer, keyboard, screen, clipboard or the OCR engine goes through the
//! traits in this module, so runs can be driven by the real desktop or by
//! in-memory fakes.
//!
//! ## Implementations
//!
//! - `EnigoInput` - mouse and keyboard via enigo (`desktop` feature)
//! - `XcapCapture` - region capture via xcap (`desktop` feature)
//! - `SystemClipboard` - clipboard via arboard (`desktop` feature)
//! - `CornerFailsafe` - pointer-in-corner abort (`desktop` feature)
//! - `FileImageLoader` - cached reference images from disk
//! - `TesseractCli` - OCR through the `tesseract` command

pub mod images;
pub mod tesseract;

#[cfg(feature = "desktop")]
pub mod clipboard;
#[cfg(feature = "desktop")]
pub mod failsafe;
#[cfg(feature = "desktop")]
pub mod input;
#[cfg(feature = "desktop")]
pub mod screenshot;

use image::{DynamicImage, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{InjectionError, SensorError};
use crate::models::{Bounds, KeyCode};

pub use images::FileImageLoader;
pub use tesseract::TesseractCli;

#[cfg(feature = "desktop")]
pub use clipboard::SystemClipboard;
#[cfg(feature = "desktop")]
pub use failsafe::CornerFailsafe;
#[cfg(feature = "desktop")]
pub use input::EnigoInput;
#[cfg(feature = "desktop")]
pub use screenshot::XcapCapture;

/// Mouse and keyboard injection. Calls are fire-and-forget.
pub trait InputInjector: Send + Sync {
    fn click(&self, x: i32, y: i32) -> Result<(), InjectionError>;

    /// Press at `from`, move to `to` over roughly `duration`, release.
    fn drag(&self, from: (i32, i32), to: (i32, i32), duration: Duration)
        -> Result<(), InjectionError>;

    /// Press `keys` in order, then release them in reverse order.
    fn send_hotkey(&self, keys: &[KeyCode]) -> Result<(), InjectionError>;

    fn press_key(&self, key: KeyCode) -> Result<(), InjectionError>;
}

/// Grabs pixels for a screen rectangle.
pub trait ScreenCapture: Send + Sync {
    fn grab(&self, bounds: Bounds) -> Result<RgbaImage, SensorError>;
}

/// Page segmentation hint passed to the OCR engine (tesseract numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegmentation {
    Auto,
    Block,
    SingleLine,
    SingleWord,
    RawLine,
}

impl PageSegmentation {
    /// Attempt order when looking for usable text.
    pub const FALLBACK_ORDER: [PageSegmentation; 5] = [
        PageSegmentation::Block,
        PageSegmentation::SingleLine,
        PageSegmentation::SingleWord,
        PageSegmentation::RawLine,
        PageSegmentation::Auto,
    ];

    pub fn psm(self) -> u8 {
        match self {
            PageSegmentation::Auto => 3,
            PageSegmentation::Block => 6,
            PageSegmentation::SingleLine => 7,
            PageSegmentation::SingleWord => 8,
            PageSegmentation::RawLine => 13,
        }
    }
}

/// Black-box text recognition. May return an empty string.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbaImage, segmentation: PageSegmentation)
        -> Result<String, SensorError>;
}

/// System clipboard text access.
pub trait Clipboard: Send + Sync {
    fn read(&self) -> Result<String, InjectionError>;
    fn write(&self, text: &str) -> Result<(), InjectionError>;
}

/// Loads reference images for image checks.
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<DynamicImage>, SensorError>;
}

/// Out-of-band abort signal, probed while a run is active.
pub trait Failsafe: Send + Sync {
    fn tripped(&self) -> bool;
}

/// Everything a run needs from the outside world.
#[derive(Clone)]
pub struct Devices {
    pub input: Arc<dyn InputInjector>,
    pub screen: Arc<dyn ScreenCapture>,
    pub ocr: Arc<dyn OcrEngine>,
    pub clipboard: Arc<dyn Clipboard>,
    pub images: Arc<dyn ImageLoader>,
}

#[cfg(feature = "desktop")]
impl Devices {
    /// Real desktop collaborators.
    pub fn system(tesseract_cmd: &str) -> anyhow::Result<Self> {
        Ok(Self {
            input: Arc::new(EnigoInput::new()?),
            screen: Arc::new(XcapCapture),
            ocr: Arc::new(TesseractCli::new(tesseract_cmd)),
            clipboard: Arc::new(SystemClipboard),
            images: Arc::new(FileImageLoader::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_order_ends_with_auto() {
        let psms: Vec<u8> = PageSegmentation::FALLBACK_ORDER
            .iter()
            .map(|s| s.psm())
            .collect();
        assert_eq!(psms, vec![6, 7, 8, 13, 3]);
    }
}
