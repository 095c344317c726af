//! Cross-platform region capture using xcap

use image::{imageops, RgbaImage};
use xcap::Monitor;

use super::ScreenCapture;
use crate::error::SensorError;
use crate::models::Bounds;

/// Captures the monitor under a region's top-left corner and crops it.
pub struct XcapCapture;

impl ScreenCapture for XcapCapture {
    fn grab(&self, bounds: Bounds) -> Result<RgbaImage, SensorError> {
        let monitor = Monitor::from_point(bounds.left, bounds.top).map_err(|e| {
            SensorError::Capture(format!(
                "No monitor at ({}, {}): {}",
                bounds.left, bounds.top, e
            ))
        })?;

        let screen = monitor
            .capture_image()
            .map_err(|e| SensorError::Capture(format!("Failed to capture monitor: {}", e)))?;

        let x = (bounds.left - monitor.x()).max(0) as u32;
        let y = (bounds.top - monitor.y()).max(0) as u32;
        if x + bounds.width > screen.width() || y + bounds.height > screen.height() {
            return Err(SensorError::Capture(format!(
                "Region {}x{} at ({}, {}) extends past the monitor edge",
                bounds.width, bounds.height, bounds.left, bounds.top
            )));
        }

        Ok(imageops::crop_imm(&screen, x, y, bounds.width, bounds.height).to_image())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grab_returns_requested_size() {
        // Headless machines have no monitor to capture
        if let Ok(image) = XcapCapture.grab(Bounds {
            left: 0,
            top: 0,
            width: 16,
            height: 12,
        }) {
            assert_eq!(image.dimensions(), (16, 12));
        }
    }
}
