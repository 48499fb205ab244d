//! Stage 5 — squint rescue (spec sec 4.5).
//!
//! A second pass over the projection using a much heavier blur, so that a
//! stave's five thin lines merge into one broad hill. Hills not already
//! covered by a first-pass stave, and tall enough relative to the known
//! staves, are synthesised into rescued five-line staves. This recovers
//! staves that the precise first pass missed (e.g. on low-resolution scans
//! where lines are faint), without producing false positives from
//! unrelated page content like footers or page numbers.

use crate::config::DetectionConfig;
use crate::pipeline::peaks::{find_peaks, moving_average};
use crate::types::Stave;

/// Rescues staves the first pass missed. Returns the combined stave list
/// (first-pass plus rescued, unsorted — callers sort by top row) and the
/// orphan peaks still unclaimed after rescue.
///
/// A no-op if there are no orphans or no first-pass staves to learn
/// geometry from, per spec sec 4.5.
pub fn squint_rescue(
    projection: &[f64],
    staves: Vec<Stave>,
    orphans: Vec<usize>,
    config: &DetectionConfig,
) -> (Vec<Stave>, Vec<usize>) {
    if orphans.is_empty() || staves.is_empty() {
        return (staves, orphans);
    }

    let typical_span = median_usize(&staves.iter().map(Stave::span).collect::<Vec<_>>());
    let typical_spacing = typical_span as f64 / 4.0;

    let blur_kernel = if typical_span % 2 == 1 {
        typical_span
    } else {
        typical_span + 1
    };
    let blurred = moving_average(projection, blur_kernel);

    let min_hill_distance = (typical_span as f64 * 0.8) as usize;
    let max_blurred = blurred.iter().cloned().fold(0.0_f64, f64::max);
    let hill_prominence = max_blurred * config.rescue_prominence_ratio;
    let hills = find_peaks(&blurred, min_hill_distance, hill_prominence);

    let cover_margin = (typical_span as f64 * 0.5) as usize;
    let covered_ranges: Vec<(usize, usize)> = staves
        .iter()
        .map(|s| (s.top().saturating_sub(cover_margin), s.bottom() + cover_margin))
        .collect();
    let is_covered = |y: usize| covered_ranges.iter().any(|&(lo, hi)| lo <= y && y <= hi);

    let first_stave_top = staves.iter().map(Stave::top).min().unwrap_or(0);
    let last_stave_bottom = staves.iter().map(Stave::bottom).max().unwrap_or(0);

    let mut sorted_staves = staves.clone();
    sorted_staves.sort_by_key(Stave::top);
    let inter_stave_gaps: Vec<usize> = sorted_staves
        .windows(2)
        .map(|w| w[1].top().saturating_sub(w[0].bottom()))
        .collect();
    let page_margin = inter_stave_gaps
        .iter()
        .max()
        .map_or(typical_span, |&g| g * 2);

    let known_heights: Vec<f64> = staves
        .iter()
        .filter_map(|s| {
            let mean_row = s.lines.iter().sum::<usize>() as f64 / s.lines.len() as f64;
            let idx = mean_row as usize;
            blurred.get(idx).copied()
        })
        .collect();
    let min_hill_height = if known_heights.is_empty() {
        0.0
    } else {
        median_f64(&known_heights) * config.rescue_height_gate_ratio
    };

    let mut sorted_hills = hills;
    sorted_hills.sort_unstable();

    // Accepted spans (first-pass staves plus every rescued stave so far),
    // checked against each new candidate so two adjacent hills in a dense
    // system can never synthesise overlapping staves.
    let mut accepted_spans: Vec<(usize, usize)> =
        staves.iter().map(|s| (s.top(), s.bottom())).collect();

    let mut rescued = Vec::new();
    let mut current_bottom = last_stave_bottom;
    let lower_bound = first_stave_top.saturating_sub(page_margin);
    for centre in sorted_hills {
        if is_covered(centre) {
            continue;
        }
        if centre < lower_bound || centre > current_bottom + page_margin {
            continue;
        }
        if blurred[centre] < min_hill_height {
            continue;
        }

        let top = (centre as f64 - typical_spacing * 2.0).round().max(0.0) as usize;
        let mut lines = [0usize; 5];
        for (i, line) in lines.iter_mut().enumerate() {
            *line = (top as f64 + i as f64 * typical_spacing).round() as usize;
        }
        let bottom = lines[4];
        // Never synthesise a stave past the page: a hill near the bottom
        // margin can otherwise produce an out-of-bounds line row.
        if bottom >= projection.len() {
            continue;
        }
        // Skip a hill whose stave would overlap one already accepted,
        // rather than aborting: dense systems can place two hills closer
        // than min_hill_distance would suggest once converted to spans.
        if accepted_spans.iter().any(|&(lo, hi)| top <= hi && bottom >= lo) {
            continue;
        }

        let stave = Stave::new(lines);
        accepted_spans.push((top, bottom));
        current_bottom = current_bottom.max(bottom);
        rescued.push(stave);
    }

    let rescued_ranges: Vec<(usize, usize)> = rescued
        .iter()
        .map(|s| (s.top().saturating_sub(5), s.bottom() + 5))
        .collect();
    let remaining_orphans: Vec<usize> = orphans
        .into_iter()
        .filter(|&o| !rescued_ranges.iter().any(|&(lo, hi)| lo <= o && o <= hi))
        .collect();

    let mut all_staves = staves;
    all_staves.extend(rescued);
    (all_staves, remaining_orphans)
}

fn median_usize(values: &[usize]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

fn median_f64(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
