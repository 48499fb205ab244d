//! Core data model: page images, staves, systems, barlines, and the
//! confidence report.
//!
//! These types are the nouns of the pipeline described in the crate-level
//! documentation. Intermediate per-stage types (peak lists, candidate
//! groups) stay private to [`crate::pipeline`]; only the structural output
//! types here cross the public API boundary.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A single-channel 8-bit page image: height `h`, width `w`, stored as a
/// row-major [`ndarray::Array2`].
///
/// Immutable for the duration of detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub(crate) pixels: Array2<u8>,
}

impl PageImage {
    /// Builds a page image from a row-major pixel buffer.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len() != height * width`. Degenerate dimensions
    /// (`height == 0` or `width == 0`) are accepted here and rejected later
    /// by [`crate::detect_staves`] as [`crate::DetectionError::DegenerateImage`],
    /// since construction is not the natural place to perform pipeline
    /// validation.
    #[must_use = "returns a new PageImage; the input buffer is not modified"]
    pub fn new(height: usize, width: usize, pixels: Vec<u8>) -> Self {
        let pixels = Array2::from_shape_vec((height, width), pixels).unwrap_or_else(|e| {
            panic!("pixel buffer does not match height*width ({height}x{width}): {e}")
        });
        Self { pixels }
    }

    /// Page height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// Page width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    /// Row-major intensity pixels, length `height() * width()`.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.pixels
            .as_slice()
            .expect("PageImage pixels are always stored in standard row-major layout")
    }

    /// Intensity at `(row, col)`.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.pixels[[row, col]]
    }
}

/// A binarised page mask: `255` marks ink, `0` marks background.
///
/// Same geometry as the [`PageImage`] it was derived from (or supplied
/// directly by the caller to skip stage 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryMask {
    pub(crate) mask: Array2<u8>,
}

impl BinaryMask {
    /// Builds a mask from a row-major `{0, 255}` buffer.
    ///
    /// # Panics
    ///
    /// Panics if `mask.len() != height * width`.
    #[must_use = "returns a new BinaryMask; the input buffer is not modified"]
    pub fn new(height: usize, width: usize, mask: Vec<u8>) -> Self {
        let mask = Array2::from_shape_vec((height, width), mask).unwrap_or_else(|e| {
            panic!("mask buffer does not match height*width ({height}x{width}): {e}")
        });
        Self { mask }
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.mask.nrows()
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.mask.ncols()
    }

    /// True if pixel `(row, col)` is ink.
    #[inline]
    #[must_use]
    pub fn is_ink(&self, row: usize, col: usize) -> bool {
        self.mask[[row, col]] > 0
    }
}

/// A detected staff: exactly five strictly increasing row indices.
///
/// Constructed only by the pipeline's stave-clustering and squint-rescue
/// stages (spec sec 4.4-4.5); never by the caller.
pub type StaveLines = [usize; 5];

/// A group of five horizontal staff lines, one row per line, ordered top to
/// bottom (`lines[0] < lines[1] < ... < lines[4]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stave {
    pub lines: StaveLines,
}

impl Stave {
    /// Builds a stave from five already-sorted, strictly increasing rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows are not strictly increasing — callers within this
    /// crate construct staves only from data already known to satisfy this
    /// (repaired, trimmed, or directly accepted groups), so a violation here
    /// is a pipeline bug, not bad input.
    #[must_use = "returns a new Stave; construct via the pipeline for validated input"]
    pub fn new(lines: StaveLines) -> Self {
        assert!(
            lines.windows(2).all(|w| w[0] < w[1]),
            "stave lines must be strictly increasing, got {lines:?}"
        );
        Self { lines }
    }

    /// Top line row.
    #[inline]
    #[must_use]
    pub const fn top(&self) -> usize {
        self.lines[0]
    }

    /// Bottom line row.
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> usize {
        self.lines[4]
    }

    /// Vertical centre, `(top + bottom) / 2`, as used for system assignment
    /// (spec sec 4.6 step 5).
    #[inline]
    #[must_use]
    pub const fn centre(&self) -> usize {
        (self.top() + self.bottom()) / 2
    }

    /// Span from top line to bottom line.
    #[inline]
    #[must_use]
    pub const fn span(&self) -> usize {
        self.bottom() - self.top()
    }
}

/// A confirmed or unconfirmed barline for one system.
///
/// `x` and `span` are both `None` when no barline was found at all; `x` can
/// be `Some` with `span` still `None` when a column was located but the
/// morphological confirmation of spec sec 4.6a rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BarlineInfo {
    pub x: Option<usize>,
    pub span: Option<(usize, usize)>,
}

impl BarlineInfo {
    /// No barline column was found at all.
    #[must_use]
    pub const fn none() -> Self {
        Self { x: None, span: None }
    }

    /// True if this system's barline was confirmed (span present).
    #[inline]
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.span.is_some()
    }
}

/// A non-empty, vertically non-overlapping, top-to-bottom ordered run of
/// staves played simultaneously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub staves: Vec<Stave>,
}

impl System {
    /// Top row of the first stave.
    ///
    /// # Panics
    ///
    /// Panics if `staves` is empty — every `System` the pipeline returns
    /// has at least one stave (spec sec 3 invariants).
    #[inline]
    #[must_use]
    pub fn top(&self) -> usize {
        self.staves.first().expect("system has no staves").top()
    }

    /// Bottom row of the last stave.
    ///
    /// # Panics
    ///
    /// Panics if `staves` is empty, for the same reason as [`Self::top`].
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> usize {
        self.staves.last().expect("system has no staves").bottom()
    }
}

/// One axis of the confidence model: a score in `[0, 1]` plus the
/// human-readable reasons that produced it (spec sec 4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisScore {
    pub score: f64,
    pub reasons: Vec<String>,
}

impl AxisScore {
    #[must_use]
    pub fn new(score: f64, reasons: Vec<String>) -> Self {
        Self { score, reasons }
    }
}

/// The full confidence report: a total plus the three contributing axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub total: f64,
    pub gap: AxisScore,
    pub barlines: AxisScore,
    pub staves: AxisScore,
}

impl ConfidenceReport {
    /// The zero-confidence report emitted when no staves are detected at
    /// all (spec sec 4, "Failure semantics").
    #[must_use]
    pub fn no_staves_detected() -> Self {
        Self {
            total: 0.0,
            gap: AxisScore::new(0.0, vec![]),
            barlines: AxisScore::new(0.0, vec![]),
            staves: AxisScore::new(0.0, vec!["No staves detected".to_string()]),
        }
    }
}

/// The structured result of running the staff-detection pipeline on one
/// page image (spec sec 6 "External Interfaces").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutput {
    /// Staves grouped into systems, top to bottom.
    pub systems: Vec<System>,
    /// All staves, flattened, top to bottom (same staves as in `systems`).
    pub staves: Vec<Stave>,
    /// Peaks rejected from every stave.
    pub orphans: Vec<usize>,
    /// One barline per system, same length and order as `systems`.
    pub barline_info: Vec<BarlineInfo>,
    /// The calibrated confidence score and its axis breakdown.
    pub confidence: ConfidenceReport,
}

impl DetectionOutput {
    /// The empty output returned for [`crate::DetectionError`]-free failure
    /// cases: too few peaks, or no ink at all (spec sec 7,
    /// "`InsufficientPeaks` (non-fatal)").
    #[must_use]
    pub fn empty(orphans: Vec<usize>) -> Self {
        Self {
            systems: Vec::new(),
            staves: Vec::new(),
            orphans,
            barline_info: Vec::new(),
            confidence: ConfidenceReport::no_staves_detected(),
        }
    }
}
