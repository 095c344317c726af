//! Similarity scoring between a captured region and a reference image
//!
//! Both images are reduced to 8-bit luma and the reference is resized to the
//! capture's dimensions, so scoring is always pixel-aligned. The score is the
//! zero-mean normalized cross-correlation, with negative correlation clamped
//! to 0. Uniform images, where correlation is undefined, use
//! `1 - mean(|diff|) / 255` instead.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};

/// Score in `[0, 1]`, higher is more similar.
pub fn compare(captured: &DynamicImage, reference: &DynamicImage) -> f64 {
    let captured = captured.to_luma8();
    let mut reference = reference.to_luma8();

    if captured.width() == 0 || captured.height() == 0 {
        return 0.0;
    }

    if reference.dimensions() != captured.dimensions() {
        reference = imageops::resize(
            &reference,
            captured.width(),
            captured.height(),
            FilterType::Triangle,
        );
    }

    cross_correlation(&captured, &reference)
        .unwrap_or_else(|| intensity_similarity(&captured, &reference))
}

/// `found = score >= threshold`
pub fn is_found(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Zero-mean NCC, `None` when either image has no variance.
fn cross_correlation(captured: &GrayImage, reference: &GrayImage) -> Option<f64> {
    let a = captured.as_raw();
    let b = reference.as_raw();
    let mean_a = mean(a);
    let mean_b = mean(b);

    let (mut cross, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&p, &q) in a.iter().zip(b) {
        let da = f64::from(p) - mean_a;
        let db = f64::from(q) - mean_b;
        cross += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    let score = cross / (var_a * var_b).sqrt();
    score.is_finite().then(|| score.clamp(0.0, 1.0))
}

fn mean(pixels: &[u8]) -> f64 {
    let total: u64 = pixels.iter().map(|&p| u64::from(p)).sum();
    total as f64 / pixels.len() as f64
}

fn intensity_similarity(a: &GrayImage, b: &GrayImage) -> f64 {
    let total: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(p, q)| u64::from(p.0[0].abs_diff(q.0[0])))
        .sum();
    let count = u64::from(a.width()) * u64::from(a.height());
    let mean = total as f64 / count as f64;
    (1.0 - mean / 255.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13) % 256) as u8;
            Rgba([v, v / 2, 255 - v, 255])
        });
        DynamicImage::ImageRgba8(img)
    }

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    #[test]
    fn test_identical_images_score_one() {
        let img = gradient(32, 24);
        let score = compare(&img, &img);
        assert!((score - 1.0).abs() < 1e-4, "score was {}", score);
    }

    #[test]
    fn test_black_vs_white_scores_near_zero() {
        let score = compare(&solid(16, 16, 0), &solid(16, 16, 255));
        assert!(score < 0.01, "score was {}", score);
    }

    #[test]
    fn test_different_dimensions_are_resized() {
        let score = compare(&gradient(40, 30), &gradient(13, 7));
        assert!((0.0..=1.0).contains(&score));

        let same = compare(&solid(40, 30, 90), &solid(5, 5, 90));
        assert!((same - 1.0).abs() < 1e-9);
    }

    fn ramp(width: u32, height: u32, inverted: bool) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, _| {
            let v = 128 + x * 127 / (width - 1);
            let v = if inverted { 383 - v } else { v };
            Luma([v as u8])
        }))
    }

    fn bar(left: bool) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(40, 20, |x, _| {
            let dark = if left { x < 8 } else { x >= 32 };
            Luma([if dark { 20 } else { 255 }])
        }))
    }

    #[test]
    fn test_inverted_image_scores_low() {
        let score = compare(&ramp(64, 16, false), &ramp(64, 16, true));
        assert!(score < 0.1, "score was {}", score);
    }

    #[test]
    fn test_structure_matters_more_than_brightness() {
        let moved = compare(&bar(true), &bar(false));
        assert!(moved < 0.5, "score was {}", moved);

        let same = compare(&bar(true), &bar(true));
        assert!((same - 1.0).abs() < 1e-9, "score was {}", same);
    }

    #[test]
    fn test_fallback_tracks_intensity_distance() {
        let a = GrayImage::from_pixel(4, 4, Luma([100]));
        let b = GrayImage::from_pixel(4, 4, Luma([151]));
        let score = intensity_similarity(&a, &b);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(is_found(0.9, 0.9));
        assert!(is_found(0.95, 0.9));
        assert!(!is_found(0.5, 0.9));
    }
}
