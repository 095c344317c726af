//! OCR through the tesseract command line tool

use image::RgbaImage;
use std::process::Command;

use super::{OcrEngine, PageSegmentation};
use crate::error::SensorError;

/// Runs `tesseract <png> stdout --psm N` for each recognition.
pub struct TesseractCli {
    command: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn args(&self, image_path: &str, segmentation: PageSegmentation) -> Vec<String> {
        vec![
            image_path.to_string(),
            "stdout".to_string(),
            "--psm".to_string(),
            segmentation.psm().to_string(),
        ]
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(
        &self,
        image: &RgbaImage,
        segmentation: PageSegmentation,
    ) -> Result<String, SensorError> {
        let file = tempfile::Builder::new()
            .prefix("macro-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| SensorError::Ocr(format!("Failed to create temp file: {}", e)))?;

        image
            .save_with_format(file.path(), image::ImageFormat::Png)
            .map_err(|e| SensorError::Ocr(format!("Failed to write capture: {}", e)))?;

        let path = file.path().to_string_lossy().into_owned();
        let output = Command::new(&self.command)
            .args(self.args(&path, segmentation))
            .output()
            .map_err(|e| SensorError::Ocr(format!("Failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SensorError::Ocr(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_carry_psm() {
        let cli = TesseractCli::default();
        assert_eq!(
            cli.args("/tmp/a.png", PageSegmentation::SingleLine),
            vec!["/tmp/a.png", "stdout", "--psm", "7"]
        );
    }

    #[test]
    fn test_missing_binary_is_ocr_error() {
        let cli = TesseractCli::new("no-such-ocr-binary-here");
        let image = RgbaImage::new(2, 2);
        let err = cli.recognize(&image, PageSegmentation::Block).unwrap_err();
        assert!(matches!(err, SensorError::Ocr(_)));
    }
}
