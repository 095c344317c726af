//! Pure image and text analysis used by image checks and OCR reads

pub mod matcher;
pub mod ocr;

pub use matcher::{compare, is_found};
pub use ocr::{extract, extract_for, recognize_with_fallback, ExtractionResult};
