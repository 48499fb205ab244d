//! Pipeline orchestration.
//!
//! Wires the seven stages together in their fixed dependency order
//! (binarise, project, find peaks, cluster staves, squint rescue, cluster
//! systems, score confidence), plus the invariant checks that guard each
//! stage boundary. This module has no public items beyond the two entry
//! points re-exported from the crate root; the individual stages stay
//! private so callers interact only through [`run`] and [`run_with_mask`].

mod barlines;
mod binarize;
mod confidence;
mod peaks;
mod projection;
mod rescue;
mod staves;

use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::types::{BinaryMask, DetectionOutput, PageImage, Stave, System};

/// Runs the full pipeline on a raw page image, including stage 1
/// (binarisation).
///
/// # Errors
///
/// Returns [`DetectionError::DegenerateImage`] if the image has zero area
/// or a uniform intensity histogram. Returns [`DetectionError::InternalInvariantViolation`]
/// if a later stage produces output violating a structural invariant (a
/// pipeline bug, not a property of the input).
pub fn run(image: &PageImage, config: &DetectionConfig) -> Result<DetectionOutput, DetectionError> {
    let mask = binarize::binarize(image)?;
    run_with_mask(&mask, config)
}

/// Runs the pipeline starting from an already-binarised mask, skipping
/// stage 1 (spec sec 6, "the caller may supply a pre-binarised mask").
///
/// # Errors
///
/// Returns [`DetectionError::InternalInvariantViolation`] if a stage
/// produces output violating a structural invariant.
pub fn run_with_mask(
    mask: &BinaryMask,
    config: &DetectionConfig,
) -> Result<DetectionOutput, DetectionError> {
    let projection = projection::horizontal_projection(mask);

    let h = mask.height();
    let kernel_size = peaks::odd_at_least(h / 500, 3);
    let min_distance = (h / 300).max(3);
    let max_proj = projection.iter().cloned().fold(0.0_f64, f64::max);
    let min_prominence = max_proj * config.peak_prominence_ratio;

    let smoothed = peaks::moving_average(&projection, kernel_size);
    let peak_rows = peaks::find_peaks(&smoothed, min_distance, min_prominence);

    log::info!(
        "peak detection: {} rows found {} candidate staff lines",
        mask.height(),
        peak_rows.len()
    );

    if peak_rows.len() < staves::MIN_PEAKS_FOR_STAVE {
        log::warn!(
            "insufficient peaks ({} < {}); returning empty output",
            peak_rows.len(),
            staves::MIN_PEAKS_FOR_STAVE
        );
        return Ok(DetectionOutput::empty(peak_rows));
    }

    let (first_pass_staves, orphans) = staves::cluster_into_staves(&peak_rows, config);
    check_staves_invariant(&first_pass_staves, "stave clustering")?;

    let (mut all_staves, orphans) =
        rescue::squint_rescue(&projection, first_pass_staves, orphans, config);
    all_staves.sort_by_key(Stave::top);
    check_staves_invariant(&all_staves, "squint rescue")?;

    let ink_band = barlines::InkBand::from_mask(mask);
    let (systems, barline_info) =
        barlines::cluster_into_systems(&all_staves, Some(&ink_band), config);
    check_systems_invariant(&systems)?;

    let confidence = confidence::compute_confidence(
        &systems,
        all_staves.len(),
        orphans.len(),
        peak_rows.len(),
        &barline_info,
        config,
    );

    Ok(DetectionOutput {
        systems,
        staves: all_staves,
        orphans,
        barline_info,
        confidence,
    })
}

/// Checks that every stave has exactly 5 lines (spec sec 3 invariants).
/// [`crate::types::Stave`] already enforces strictly increasing lines at
/// construction, so only the line count needs checking here.
fn check_staves_invariant(staves: &[Stave], stage: &'static str) -> Result<(), DetectionError> {
    if staves.iter().all(|s| s.lines.len() == 5) {
        Ok(())
    } else {
        Err(DetectionError::invariant(
            stage,
            "a stave with a line count other than 5 survived",
        ))
    }
}

/// Checks that every system is non-empty and that systems are sorted
/// top-to-bottom (spec sec 3 invariants).
fn check_systems_invariant(systems: &[System]) -> Result<(), DetectionError> {
    if systems.iter().any(|s| s.staves.is_empty()) {
        return Err(DetectionError::invariant(
            "system clustering",
            "a system with zero staves was produced",
        ));
    }
    for pair in systems.windows(2) {
        if pair[0].bottom() > pair[1].top() {
            return Err(DetectionError::invariant(
                "system clustering",
                "systems are not sorted top-to-bottom",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_score(rows: usize, cols: usize, stave_tops: &[usize], spacing: usize) -> PageImage {
        let mut pixels = vec![240u8; rows * cols];
        for &top in stave_tops {
            for i in 0..5 {
                let row = top + i * spacing;
                if row < rows {
                    for col in (cols / 10)..(cols - cols / 10) {
                        pixels[row * cols + col] = 10;
                    }
                }
            }
        }
        PageImage::new(rows, cols, pixels)
    }

    #[test]
    fn end_to_end_detects_one_stave() {
        let config = DetectionConfig::default();
        let image = synthetic_score(200, 600, &[50], 6);
        let output = run(&image, &config).unwrap();
        assert_eq!(output.staves.len(), 1);
        assert_eq!(output.systems.len(), 1);
    }

    #[test]
    fn end_to_end_rejects_degenerate_image() {
        let config = DetectionConfig::default();
        let image = PageImage::new(0, 0, vec![]);
        let err = run(&image, &config).unwrap_err();
        assert!(err.is_degenerate_image());
    }

    #[test]
    fn end_to_end_blank_page_has_no_staves() {
        let config = DetectionConfig::default();
        let image = PageImage::new(100, 100, vec![128; 10_000]);
        let err = run(&image, &config).unwrap_err();
        assert!(err.is_degenerate_image());
    }

    #[test]
    fn sparse_ink_with_too_few_peaks_is_non_fatal() {
        let config = DetectionConfig::default();
        // A single faint dot: binarises fine, but yields far fewer than 5
        // peaks, which is the non-fatal InsufficientPeaks condition.
        let mut pixels = vec![240u8; 100 * 100];
        pixels[50 * 100 + 50] = 10;
        let image = PageImage::new(100, 100, pixels);
        let output = run(&image, &config).unwrap();
        assert!(output.staves.is_empty());
        assert_eq!(output.confidence.total, 0.0);
    }
}
