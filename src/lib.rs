//! # score-staff-detector
//!
//! A pure, single-threaded pipeline that converts a rasterised orchestral
//! score page into a structured list of staves grouped into systems,
//! together with a calibrated, explainable confidence score.
//!
//! The pipeline is a fixed sequence of seven stages: binarise, project,
//! detect peaks, cluster staves, squint-rescue missed staves, cluster
//! systems via barline morphology, then score confidence. Each stage
//! consumes only the previous stage's output — there is no shared mutable
//! state, no I/O, and no asynchrony inside the core.
//!
//! ## Scope
//!
//! This crate does not recognise musical symbols, label instruments,
//! handle handwritten scores, segment per-measure, or persist state
//! between invocations. It is a pure function from a page image (or a
//! pre-binarised mask) to a structural description; rendering, rasterising
//! PDF pages, and serving results over a network are all the caller's
//! responsibility.
//!
//! ## Quick start
//!
//! ```
//! use score_staff_detector::{detect_staves, DetectionConfig, PageImage};
//!
//! # fn main() -> score_staff_detector::Result<()> {
//! // A blank page has no ink at all, so this fails fast with DegenerateImage;
//! // a real caller supplies a rasterised page with visible staff lines.
//! let page = PageImage::new(4, 4, vec![255; 16]);
//! match detect_staves(&page, &DetectionConfig::default()) {
//!     Ok(output) => println!("{} systems found", output.systems.len()),
//!     Err(err) => println!("detection failed: {err}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Every heuristic constant in the pipeline is an explicit field on
//! [`DetectionConfig`], built via [`DetectionConfigBuilder`]. Start from
//! [`DetectionConfig::default`] (the reference numeric contract) and
//! override only what you need to tune.
//!
//! ## Logging
//!
//! The pipeline logs stage-boundary diagnostics (peak counts, thresholds,
//! non-fatal conditions) through the [`log`] facade at `debug`/`info`/`warn`
//! levels. Install any `log`-compatible subscriber (e.g. `env_logger`) to
//! see them.

mod config;
mod error;
mod pipeline;
mod types;

pub use config::{DetectionConfig, DetectionConfigBuilder};
pub use error::{DetectionError, Result};
pub use types::{
    AxisScore, BarlineInfo, BinaryMask, ConfidenceReport, DetectionOutput, PageImage, Stave,
    StaveLines, System,
};

/// Runs the full detection pipeline on a raw page image.
///
/// Performs binarisation (stage 1) before running the rest of the
/// pipeline. To skip binarisation when the caller already has a mask, use
/// [`detect_staves_with_mask`].
///
/// # Errors
///
/// Returns [`DetectionError::DegenerateImage`] if the image has zero area
/// or a uniform intensity histogram (Otsu's method cannot separate two
/// classes). Returns [`DetectionError::InternalInvariantViolation`] if a
/// later stage produces output that violates a structural invariant — this
/// indicates a pipeline bug, not a property of the input.
///
/// A page with fewer than five detected staff-line candidates is not an
/// error: [`DetectionOutput::empty`] is returned with confidence `0.0`
/// (spec's `InsufficientPeaks`, non-fatal).
pub fn detect_staves(
    image: &PageImage,
    config: &DetectionConfig,
) -> Result<DetectionOutput> {
    pipeline::run(image, config)
}

/// Runs the detection pipeline starting from an already-binarised mask,
/// skipping stage 1.
///
/// # Errors
///
/// Returns [`DetectionError::InternalInvariantViolation`] if a stage
/// produces output that violates a structural invariant.
pub fn detect_staves_with_mask(
    mask: &BinaryMask,
    config: &DetectionConfig,
) -> Result<DetectionOutput> {
    pipeline::run_with_mask(mask, config)
}
