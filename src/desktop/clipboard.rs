use super::Clipboard;
use crate::error::InjectionError;

/// Clipboard backed by arboard. A fresh handle is opened per call.
pub struct SystemClipboard;

fn open() -> Result<arboard::Clipboard, InjectionError> {
    arboard::Clipboard::new().map_err(|e| InjectionError::Clipboard(e.to_string()))
}

impl Clipboard for SystemClipboard {
    fn read(&self) -> Result<String, InjectionError> {
        open()?
            .get_text()
            .map_err(|e| InjectionError::Clipboard(e.to_string()))
    }

    fn write(&self, text: &str) -> Result<(), InjectionError> {
        open()?
            .set_text(text.to_string())
            .map_err(|e| InjectionError::Clipboard(e.to_string()))
    }
}
