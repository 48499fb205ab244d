//! Stage 7 — confidence scoring (spec sec 4.7).
//!
//! Three independent quality signals are combined into one explainable
//! score: how cleanly staves grouped into systems, how many systems got a
//! confirmed barline, and how many peaks were salvaged into valid staves.
//! Each axis keeps its own human-readable reasons alongside its score.

use crate::config::DetectionConfig;
use crate::types::{AxisScore, BarlineInfo, ConfidenceReport, System};

/// Computes the full confidence report for one detection run.
///
/// Returns [`ConfidenceReport::no_staves_detected`] unmodified if `staves`
/// is empty — there is nothing to score.
pub fn compute_confidence(
    systems: &[System],
    stave_count: usize,
    orphan_count: usize,
    total_peaks: usize,
    barline_info: &[BarlineInfo],
    config: &DetectionConfig,
) -> ConfidenceReport {
    if stave_count == 0 {
        return ConfidenceReport::no_staves_detected();
    }

    let gap = score_gaps(systems);
    let barlines = score_barlines(barline_info);
    let staves = score_stave_quality(stave_count, orphan_count, total_peaks);

    let mut total = gap.score * config.gap_score_weight
        + barlines.score * config.barline_score_weight
        + staves.score * config.stave_score_weight;

    if gap.score >= 0.7 && barlines.score >= 1.0 {
        total = (total + config.agreement_bonus).min(1.0);
    }
    total = total.min(1.0);

    ConfidenceReport {
        total,
        gap,
        barlines,
        staves,
    }
}

/// Scores system-grouping cleanliness: consistent system sizes and no
/// singleton systems (a lone system on the page is not penalized).
fn score_gaps(systems: &[System]) -> AxisScore {
    let mut score: f64 = 1.0;
    let mut reasons = Vec::new();

    if systems.len() > 1 {
        let sizes: Vec<usize> = systems.iter().map(|s| s.staves.len()).collect();
        let first = sizes[0];
        if sizes.iter().any(|&s| s != first) {
            score -= 0.3;
            reasons.push(format!("Inconsistent system sizes: {sizes:?}"));
        }
    }

    if systems.iter().any(|s| s.staves.len() < 2) {
        score -= 0.4;
        reasons.push("System with fewer than 2 staves".to_string());
    }

    AxisScore::new(score.max(0.0), reasons)
}

/// Scores barline confirmation: the fraction of systems whose barline
/// survived morphological confirmation.
fn score_barlines(barline_info: &[BarlineInfo]) -> AxisScore {
    if barline_info.is_empty() {
        return AxisScore::new(0.0, vec!["No barline analysis performed".to_string()]);
    }

    let confirmed = barline_info.iter().filter(|i| i.is_confirmed()).count();
    let total = barline_info.len();
    let score = confirmed as f64 / total as f64;

    let reason = if confirmed == total {
        format!("All {total} systems confirmed by barlines")
    } else if confirmed == 0 {
        format!("No barlines found (0/{total} systems)")
    } else {
        format!("Barlines found for {confirmed}/{total} systems")
    };

    AxisScore::new(score, vec![reason])
}

/// Scores individual stave integrity: penalizes peaks that never made it
/// into a valid five-line stave.
fn score_stave_quality(stave_count: usize, orphan_count: usize, total_peaks: usize) -> AxisScore {
    if stave_count == 0 {
        return AxisScore::new(0.0, vec!["No staves detected".to_string()]);
    }

    let mut score = 1.0;
    let mut reasons = Vec::new();
    if orphan_count > 0 {
        let orphan_ratio = if total_peaks > 0 {
            orphan_count as f64 / total_peaks as f64
        } else {
            0.0
        };
        score -= (orphan_ratio * 2.0).min(0.5);
        reasons.push(format!(
            "{orphan_count} orphan lines ({:.0}% of detected)",
            orphan_ratio * 100.0
        ));
    }

    AxisScore::new(score.max(0.0), reasons)
}
