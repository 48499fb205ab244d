//! Pipeline tunables.
//!
//! Every heuristic constant named as load-bearing in the pipeline's design
//! notes (prominence ratios, tolerances, kernel scales, the confidence
//! weighting triple) lives here as an explicit, plain configuration record
//! rather than as a module-level constant, so the numeric contract is
//! visible and overridable at the call site.

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Explicit tunables for one run of [`crate::detect_staves`].
///
/// `DetectionConfig::default()` reproduces the pipeline's reference numeric
/// contract exactly; use [`DetectionConfigBuilder`] to override individual
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum fraction of the projection's maximum a peak must rise above
    /// its surrounding valleys to be accepted (stage 3).
    pub peak_prominence_ratio: f64,
    /// Tolerance for accepting a repaired 3-4 line group as a stave: the
    /// implied spacing must be within this fraction of the typical spacing
    /// (stage 4).
    pub repair_tolerance: f64,
    /// Multiplier on the local median gap beyond which an oversized group
    /// is split into a new sub-group (stage 4a).
    pub split_gap_multiplier: f64,
    /// Minimum fraction of the blurred signal's maximum a hill must rise
    /// above its surroundings to be rescued (stage 5).
    pub rescue_prominence_ratio: f64,
    /// Minimum fraction of the median known-stave hill height a rescued
    /// hill must reach (stage 5).
    pub rescue_height_gate_ratio: f64,
    /// Minimum fraction of a system's vertical extent a barline run must
    /// span to count as confirmed (stage 6a).
    pub barline_confirmation_ratio: f64,
    /// Half-width, in columns, of the strip extracted around a candidate
    /// barline column (stage 6).
    pub barline_jitter: usize,
    /// Minimum length, in rows, of a contiguous ink run to be treated as a
    /// barline run rather than noise (stage 6). Assumes >=300 DPI input;
    /// see [`DetectionConfigBuilder::low_dpi`] for lower-resolution scans.
    pub min_barline_run_length: usize,
    /// Fraction of the page width searched (from the left) for the rough
    /// barline column (stage 6 step 1).
    pub barline_search_width_ratio: f64,
    /// Minimum ink fraction, of the vertical band height, for a column to
    /// be a barline/bracket candidate (stage 6 step 1).
    pub barline_min_ink_ratio: f64,
    /// Weight of the gap axis in the aggregate confidence score (stage 7).
    pub gap_score_weight: f64,
    /// Weight of the barline axis in the aggregate confidence score
    /// (stage 7).
    pub barline_score_weight: f64,
    /// Weight of the stave-quality axis in the aggregate confidence score
    /// (stage 7).
    pub stave_score_weight: f64,
    /// Bonus added to the aggregate score when the gap and barline axes
    /// agree strongly (stage 7).
    pub agreement_bonus: f64,
}

impl Default for DetectionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            peak_prominence_ratio: 0.15,
            repair_tolerance: 0.4,
            split_gap_multiplier: 1.8,
            rescue_prominence_ratio: 0.08,
            rescue_height_gate_ratio: 0.6,
            barline_confirmation_ratio: 0.8,
            barline_jitter: 3,
            min_barline_run_length: 50,
            barline_search_width_ratio: 0.6,
            barline_min_ink_ratio: 0.15,
            gap_score_weight: 0.25,
            barline_score_weight: 0.50,
            stave_score_weight: 0.25,
            agreement_bonus: 0.1,
        }
    }
}

/// Fluent builder for [`DetectionConfig`], validating every tunable on
/// [`build`](Self::build).
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfigBuilder {
    config: DetectionConfig,
}

impl Default for DetectionConfigBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionConfigBuilder {
    /// Starts from [`DetectionConfig::default`].
    #[inline]
    #[must_use = "returns a new builder with default settings"]
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
        }
    }

    /// Alias for [`Self::new`], named to mirror
    /// [`DetectionConfig::default`] at call sites that prefer the builder.
    #[inline]
    #[must_use = "returns a new builder with default settings"]
    pub fn defaults() -> Self {
        Self::new()
    }

    /// Preset for scans below ~300 DPI: relaxes the minimum barline run
    /// length, which is an absolute pixel threshold in the reference
    /// implementation and would otherwise reject real barlines on
    /// low-resolution input.
    #[must_use = "returns a new builder; call build() to produce a DetectionConfig"]
    pub fn low_dpi() -> Self {
        let mut builder = Self::new();
        builder.config.min_barline_run_length = 20;
        builder
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn peak_prominence_ratio(mut self, value: f64) -> Self {
        self.config.peak_prominence_ratio = value;
        self
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn repair_tolerance(mut self, value: f64) -> Self {
        self.config.repair_tolerance = value;
        self
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn split_gap_multiplier(mut self, value: f64) -> Self {
        self.config.split_gap_multiplier = value;
        self
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn rescue_prominence_ratio(mut self, value: f64) -> Self {
        self.config.rescue_prominence_ratio = value;
        self
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn rescue_height_gate_ratio(mut self, value: f64) -> Self {
        self.config.rescue_height_gate_ratio = value;
        self
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn barline_confirmation_ratio(mut self, value: f64) -> Self {
        self.config.barline_confirmation_ratio = value;
        self
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn barline_jitter(mut self, value: usize) -> Self {
        self.config.barline_jitter = value;
        self
    }

    #[must_use = "builder methods consume and return Self"]
    pub fn min_barline_run_length(mut self, value: usize) -> Self {
        self.config.min_barline_run_length = value;
        self
    }

    /// Validates every tunable and produces a [`DetectionConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ConfigError`] if any ratio falls outside
    /// `[0.0, 1.0]`, if any weight is negative, if the three confidence
    /// weights do not sum to `1.0` (within floating-point tolerance), or if
    /// a pixel threshold is zero where the algorithm requires a positive
    /// value.
    pub fn build(self) -> Result<DetectionConfig, DetectionError> {
        let c = &self.config;
        let unit_ratio = |name: &str, v: f64| -> Result<(), DetectionError> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(DetectionError::config(format!(
                    "{name} must be in [0, 1], got {v}"
                )))
            }
        };
        unit_ratio("peak_prominence_ratio", c.peak_prominence_ratio)?;
        unit_ratio("repair_tolerance", c.repair_tolerance)?;
        unit_ratio("rescue_prominence_ratio", c.rescue_prominence_ratio)?;
        unit_ratio("rescue_height_gate_ratio", c.rescue_height_gate_ratio)?;
        unit_ratio("barline_confirmation_ratio", c.barline_confirmation_ratio)?;
        unit_ratio("barline_search_width_ratio", c.barline_search_width_ratio)?;
        unit_ratio("barline_min_ink_ratio", c.barline_min_ink_ratio)?;
        unit_ratio("gap_score_weight", c.gap_score_weight)?;
        unit_ratio("barline_score_weight", c.barline_score_weight)?;
        unit_ratio("stave_score_weight", c.stave_score_weight)?;
        unit_ratio("agreement_bonus", c.agreement_bonus)?;

        if c.split_gap_multiplier <= 1.0 {
            return Err(DetectionError::config(format!(
                "split_gap_multiplier must be > 1.0, got {}",
                c.split_gap_multiplier
            )));
        }
        if c.min_barline_run_length == 0 {
            return Err(DetectionError::config(
                "min_barline_run_length must be positive",
            ));
        }
        let weight_sum = c.gap_score_weight + c.barline_score_weight + c.stave_score_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(DetectionError::config(format!(
                "confidence weights must sum to 1.0, got {weight_sum}"
            )));
        }

        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_contract() {
        let c = DetectionConfig::default();
        assert_eq!(c.peak_prominence_ratio, 0.15);
        assert_eq!(c.repair_tolerance, 0.4);
        assert_eq!(c.split_gap_multiplier, 1.8);
        assert_eq!(c.rescue_prominence_ratio, 0.08);
        assert_eq!(c.rescue_height_gate_ratio, 0.6);
        assert_eq!(c.barline_confirmation_ratio, 0.8);
        assert_eq!(c.gap_score_weight, 0.25);
        assert_eq!(c.barline_score_weight, 0.50);
        assert_eq!(c.stave_score_weight, 0.25);
        assert_eq!(c.agreement_bonus, 0.1);
    }

    #[test]
    fn builder_defaults_build_successfully() {
        assert!(DetectionConfigBuilder::new().build().is_ok());
    }

    #[test]
    fn builder_rejects_out_of_range_ratio() {
        let err = DetectionConfigBuilder::new()
            .peak_prominence_ratio(1.5)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn builder_rejects_bad_split_multiplier() {
        let err = DetectionConfigBuilder::new()
            .split_gap_multiplier(1.0)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn builder_rejects_zero_run_length() {
        let err = DetectionConfigBuilder::new()
            .min_barline_run_length(0)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn low_dpi_preset_relaxes_run_length() {
        let c = DetectionConfigBuilder::low_dpi().build().unwrap();
        assert!(c.min_barline_run_length < DetectionConfig::default().min_barline_run_length);
    }
}
