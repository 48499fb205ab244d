//! Error types for the staff-detection pipeline.
//!
//! This module defines the fatal error kinds the pipeline can surface. All
//! public APIs use the [`Result`] alias, which wraps [`DetectionError`].
//!
//! Most pipeline anomalies (no barlines found, inconsistent system sizes,
//! many orphan peaks, too few peaks to form a stave) are **not** errors —
//! they lower [`crate::ConfidenceReport::total`] and populate the relevant
//! `reasons` list instead. `DetectionError` is reserved for conditions that
//! make returning a structural result impossible or that indicate a bug in
//! the pipeline itself.
//!
//! # Examples
//!
//! ```no_run
//! use score_staff_detector::{detect_staves, DetectionConfig, DetectionError, PageImage};
//!
//! # fn example(image: PageImage) -> score_staff_detector::Result<()> {
//! match detect_staves(&image, &DetectionConfig::default()) {
//!     Ok(output) => log::debug!("confidence: {}", output.confidence.total),
//!     Err(DetectionError::DegenerateImage { reason }) => {
//!         log::warn!("cannot analyze page: {reason}");
//!     }
//!     Err(e) => log::error!("pipeline bug: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

/// Errors that can occur while detecting staves on a page.
///
/// # Error categories
///
/// - **Configuration errors** ([`ConfigError`]): an invalid tunable was
///   supplied to [`crate::DetectionConfigBuilder`] (user error, fixable).
/// - **Degenerate input** ([`DegenerateImage`]): the page image cannot be
///   analyzed at all (zero area, or a uniform histogram that defeats Otsu's
///   method).
/// - **Invariant violations** ([`InternalInvariantViolation`]): a
///   post-stage check failed (e.g. a stave with other than 5 lines survived
///   clustering). This always indicates a bug in the pipeline, never bad
///   input.
///
/// [`ConfigError`]: DetectionError::ConfigError
/// [`DegenerateImage`]: DetectionError::DegenerateImage
/// [`InternalInvariantViolation`]: DetectionError::InternalInvariantViolation
#[derive(Debug)]
pub enum DetectionError {
    /// The page image cannot be processed at all.
    ///
    /// Occurs when the image has zero area (`height * width == 0`) or when
    /// Otsu's method fails because the intensity histogram is uniform (no
    /// threshold separates two classes). Fatal: the caller receives no
    /// partial output.
    DegenerateImage {
        /// Human-readable description of why the image is degenerate.
        reason: String,
    },

    /// A post-stage structural check failed.
    ///
    /// This always indicates a bug in the pipeline (e.g. a stave with a
    /// line count other than 5 survived stage 4, or systems were not
    /// sorted top-to-bottom before being returned). It is never raised in
    /// response to ordinary messy input — those cases lower confidence
    /// instead.
    InternalInvariantViolation {
        /// Name of the stage whose output violated an invariant.
        stage: &'static str,
        /// Description of the violated invariant.
        detail: String,
    },

    /// A [`crate::DetectionConfigBuilder`] tunable was out of its valid range.
    ConfigError {
        /// Description of what is invalid in the configuration.
        reason: String,
    },
}

impl DetectionError {
    /// Builds a [`DetectionError::DegenerateImage`].
    #[inline]
    #[must_use = "this constructs an error value, it does not raise it"]
    pub fn degenerate_image(reason: impl Into<String>) -> Self {
        Self::DegenerateImage {
            reason: reason.into(),
        }
    }

    /// Builds a [`DetectionError::InternalInvariantViolation`].
    #[inline]
    #[must_use = "this constructs an error value, it does not raise it"]
    pub fn invariant(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::InternalInvariantViolation {
            stage,
            detail: detail.into(),
        }
    }

    /// Builds a [`DetectionError::ConfigError`].
    #[inline]
    #[must_use = "this constructs an error value, it does not raise it"]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a configuration error (user-fixable).
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns true if this is a degenerate-image error.
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_degenerate_image(&self) -> bool {
        matches!(self, Self::DegenerateImage { .. })
    }

    /// Returns true if this indicates a pipeline bug rather than bad input.
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InternalInvariantViolation { .. })
    }
}

impl fmt::Display for DetectionError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateImage { reason } => {
                write!(f, "cannot analyze page: {reason}")
            }
            Self::InternalInvariantViolation { stage, detail } => {
                write!(f, "invariant violated after stage '{stage}': {detail}")
            }
            Self::ConfigError { reason } => {
                write!(f, "invalid detection configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for DetectionError {}

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, DetectionError>;
