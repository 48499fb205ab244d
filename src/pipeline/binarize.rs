//! Stage 1 — binarisation via Otsu's method.
//!
//! Converts a grayscale page into an ink/background mask: pixels darker
//! than the Otsu threshold become ink (`255`), the rest become background
//! (`0`).

use crate::error::DetectionError;
use crate::types::{BinaryMask, PageImage};

/// Runs Otsu's method and binarises `image` into a [`BinaryMask`].
///
/// # Errors
///
/// Returns [`DetectionError::DegenerateImage`] if the image has zero area,
/// or if the intensity histogram is uniform (every pixel has the same
/// value), which leaves no threshold that separates two classes.
pub fn binarize(image: &PageImage) -> Result<BinaryMask, DetectionError> {
    let (h, w) = (image.height(), image.width());
    if h == 0 || w == 0 {
        return Err(DetectionError::degenerate_image(format!(
            "zero-area image ({w}x{h})"
        )));
    }

    let threshold = otsu_threshold(image.pixels())?;
    log::debug!("binarize: otsu threshold = {threshold}");

    let mask: Vec<u8> = image
        .pixels()
        .iter()
        .map(|&v| if v < threshold { 255 } else { 0 })
        .collect();

    Ok(BinaryMask::new(h, w, mask))
}

/// Finds the Otsu threshold `t*` maximising inter-class variance over the
/// 256-bin intensity histogram of `pixels`.
///
/// # Errors
///
/// Returns [`DetectionError::DegenerateImage`] if the histogram is uniform
/// (a single intensity value across the whole image), since no threshold
/// separates two classes in that case.
fn otsu_threshold(pixels: &[u8]) -> Result<u8, DetectionError> {
    let mut histogram = [0u64; 256];
    for &p in pixels {
        histogram[p as usize] += 1;
    }

    let total = pixels.len() as f64;
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0.0;
    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;

    for t in 0..256 {
        weight_background += histogram[t] as f64;
        if weight_background == 0.0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground <= 0.0 {
            break;
        }

        sum_background += t as f64 * histogram[t] as f64;
        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_all - sum_background) / weight_foreground;

        let between_class_variance = weight_background
            * weight_foreground
            * (mean_background - mean_foreground).powi(2);

        if between_class_variance > best_variance {
            best_variance = between_class_variance;
            best_threshold = t as u8;
        }
    }

    if best_variance <= 0.0 {
        return Err(DetectionError::degenerate_image(
            "uniform intensity histogram defeats Otsu thresholding",
        ));
    }

    Ok(best_threshold)
}
