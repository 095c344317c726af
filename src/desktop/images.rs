use dashmap::DashMap;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ImageLoader;
use crate::error::SensorError;

/// Loads reference images from disk, decoding each path at most once.
#[derive(Default)]
pub struct FileImageLoader {
    cache: DashMap<PathBuf, Arc<DynamicImage>>,
}

impl FileImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drop every decoded image, e.g. after reference files were edited.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> Result<Arc<DynamicImage>, SensorError> {
        if let Some(image) = self.cache.get(path) {
            return Ok(Arc::clone(image.value()));
        }

        if !path.exists() {
            return Err(SensorError::ImageNotFound(path.to_path_buf()));
        }

        let image = image::open(path).map_err(|e| SensorError::ImageDecode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let image = Arc::new(image);

        self.cache.insert(path.to_path_buf(), Arc::clone(&image));
        tracing::debug!("Cached reference image {}", path.display());
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_missing_file_is_not_found() {
        let loader = FileImageLoader::new();
        let err = loader.load(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, SensorError::ImageNotFound(_)));
    }

    #[test]
    fn test_decoded_once_then_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.png");
        RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let loader = FileImageLoader::new();
        let first = loader.load(&path).unwrap();
        let second = loader.load(&path).unwrap();

        assert_eq!(first.width(), 4);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.cached(), 1);
    }

    #[test]
    fn test_garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = FileImageLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, SensorError::ImageDecode { .. }));
    }
}
