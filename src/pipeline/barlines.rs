//! Stage 6 — system clustering and barline morphology (spec sec 4.6, 4.6a).
//!
//! Two independent strategies decide which staves belong to the same
//! system: a primary pass that finds the page's barline column and slices
//! it into system-sized runs, and a gap-heuristic fallback used whenever
//! the primary pass can't place every stave. Either way, each resulting
//! system is then independently checked for a confirmed barline span via
//! morphological opening.

use image::{GrayImage, Luma};

use crate::config::DetectionConfig;
use crate::types::{BarlineInfo, Stave, System};

/// Groups `staves` into systems and reports a [`BarlineInfo`] per system, in
/// the same order.
///
/// `mask` is optional: without it (or when no barline column can be
/// located), grouping falls straight to the gap heuristic and every system
/// is reported unconfirmed.
pub fn cluster_into_systems(
    staves: &[Stave],
    mask: Option<&InkBand>,
    config: &DetectionConfig,
) -> (Vec<System>, Vec<BarlineInfo>) {
    if staves.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut sorted = staves.to_vec();
    sorted.sort_by_key(Stave::top);

    let mut groups = None;
    if let Some(mask) = mask {
        let full_range = (0, mask.height() - 1);
        if let Some(fine_x) = locate_fine_barline_x(mask, full_range, config) {
            let runs = find_barline_runs(mask, fine_x, config);
            if runs.len() >= 2 {
                let spans = split_runs_into_systems(&runs, &sorted, config);
                groups = cluster_by_barlines(&sorted, &spans, config);
            }
        }
    }
    let groups = groups.unwrap_or_else(|| cluster_by_gap(&sorted));

    let mut systems = Vec::with_capacity(groups.len());
    let mut barline_info = Vec::with_capacity(groups.len());
    for group in groups {
        let y_top = group.iter().map(Stave::top).min().unwrap_or(0);
        let y_bottom = group.iter().map(Stave::bottom).max().unwrap_or(0);
        let info = mask.map_or(BarlineInfo::none(), |mask| {
            confirm_system_barline(mask, y_top, y_bottom, config)
        });
        systems.push(System { staves: group });
        barline_info.push(info);
    }

    (systems, barline_info)
}

/// Median height (top line to bottom line) across all staves, or a fallback
/// of 40 rows when `staves` is empty.
fn typical_stave_span(staves: &[Stave]) -> usize {
    if staves.is_empty() {
        return 40;
    }
    let mut spans: Vec<usize> = staves.iter().map(Stave::span).collect();
    spans.sort_unstable();
    spans[spans.len() / 2]
}

/// Splits `staves` into systems wherever the inter-stave gap exceeds twice
/// the median gap (spec sec 4.6 fallback strategy).
fn cluster_by_gap(staves: &[Stave]) -> Vec<Vec<Stave>> {
    if staves.len() <= 1 {
        return vec![staves.to_vec()];
    }

    let gaps: Vec<usize> = staves
        .windows(2)
        .map(|w| w[1].top().saturating_sub(w[0].bottom()))
        .collect();
    let mut sorted_gaps = gaps.clone();
    sorted_gaps.sort_unstable();
    let median = median_usize(&sorted_gaps);
    let threshold = median as f64 * 2.0;

    let mut systems = Vec::new();
    let mut current = vec![staves[0]];
    for (i, &gap) in gaps.iter().enumerate() {
        if gap as f64 > threshold {
            systems.push(std::mem::take(&mut current));
        }
        current.push(staves[i + 1]);
    }
    systems.push(current);
    systems
}

/// Matches each stave to the barline span whose vertical extent (plus a
/// tolerance of half the typical stave span) contains its centre. Returns
/// `None` if any stave cannot be matched to a span, signalling the caller
/// to fall back to the gap heuristic.
fn cluster_by_barlines(
    staves: &[Stave],
    spans: &[(usize, usize)],
    _config: &DetectionConfig,
) -> Option<Vec<Vec<Stave>>> {
    let tolerance = typical_stave_span(staves) / 2;
    let mut groups: Vec<Vec<Stave>> = vec![Vec::new(); spans.len()];
    for &stave in staves {
        let centre = stave.centre();
        let mut matched = false;
        for (i, &(top, bottom)) in spans.iter().enumerate() {
            if top.saturating_sub(tolerance) <= centre && centre <= bottom + tolerance {
                groups[i].push(stave);
                matched = true;
                break;
            }
        }
        if !matched {
            return None;
        }
    }
    Some(groups.into_iter().filter(|g| !g.is_empty()).collect())
}

/// Splits barline runs into system spans at gaps exceeding `2x` the median
/// run gap (spec sec 4.6a). With exactly two runs, the single gap is always
/// a system boundary.
fn split_runs_into_systems(
    runs: &[(usize, usize)],
    staves: &[Stave],
    _config: &DetectionConfig,
) -> Vec<(usize, usize)> {
    if runs.len() <= 1 {
        return runs.to_vec();
    }

    let gaps: Vec<usize> = runs.windows(2).map(|w| w[1].0.saturating_sub(w[0].1)).collect();
    if gaps.len() == 1 {
        return runs.to_vec();
    }

    let min_gap = typical_stave_span(staves);
    let mut sorted_gaps = gaps.clone();
    sorted_gaps.sort_unstable();
    let median = median_usize(&sorted_gaps) as f64;
    let threshold = (median * 2.0).max(min_gap as f64);

    let mut spans = Vec::new();
    let mut span_start = runs[0].0;
    for (i, &gap) in gaps.iter().enumerate() {
        if gap as f64 > threshold {
            spans.push((span_start, runs[i].1));
            span_start = runs[i + 1].0;
        }
    }
    spans.push((span_start, runs.last().unwrap().1));
    spans
}

fn median_usize(sorted: &[usize]) -> usize {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2
    }
}

/// A view over a binary mask's ink columns as an [`image::GrayImage`],
/// sufficient for barline morphology without depending on
/// [`crate::types::BinaryMask`]'s internal layout directly (keeps this
/// module testable with synthetic bands).
pub struct InkBand {
    image: GrayImage,
}

impl InkBand {
    #[must_use]
    pub fn from_mask(mask: &crate::types::BinaryMask) -> Self {
        let (height, width) = (mask.height() as u32, mask.width() as u32);
        let mut image = GrayImage::new(width, height);
        for row in 0..mask.height() {
            for col in 0..mask.width() {
                if mask.is_ink(row, col) {
                    image.put_pixel(col as u32, row as u32, Luma([255]));
                }
            }
        }
        Self { image }
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.image.height() as usize
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.image.width() as usize
    }

    #[inline]
    fn is_ink(&self, row: usize, col: usize) -> bool {
        self.image.get_pixel(col as u32, row as u32).0[0] > 0
    }
}

/// Step 1 of spec sec 4.6: the leftmost cluster of columns whose ink
/// fraction (within `[y_top, y_bottom]`) exceeds `min_ink_ratio`, searched
/// only within the left `search_ratio` of the page width. Returns the
/// cluster's peak column (highest ink count), or `None`.
fn find_rough_barline_x(
    mask: &InkBand,
    (y_top, y_bottom): (usize, usize),
    config: &DetectionConfig,
) -> Option<usize> {
    let y_top = y_top.min(mask.height().saturating_sub(1));
    let y_bottom = y_bottom.min(mask.height().saturating_sub(1));
    let band_h = y_bottom - y_top + 1;
    let search_w = (mask.width() as f64 * config.barline_search_width_ratio) as usize;
    let min_ink = (band_h as f64 * config.barline_min_ink_ratio) as usize;

    let counts: Vec<usize> = (0..search_w.min(mask.width()))
        .map(|col| (y_top..=y_bottom).filter(|&row| mask.is_ink(row, col)).count())
        .collect();
    let candidates: Vec<usize> = counts
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c >= min_ink)
        .map(|(i, _)| i)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mut cluster = vec![candidates[0]];
    for &c in &candidates[1..] {
        if c - *cluster.last().unwrap() <= 5 {
            cluster.push(c);
        } else {
            break;
        }
    }
    cluster.into_iter().max_by_key(|&c| counts[c])
}

/// Step 2: refines a rough barline column by searching rightward for the
/// column with the longest unbroken vertical ink run (the thin, continuous
/// barline, as opposed to a wider but gappier bracket).
fn find_fine_barline_x(
    mask: &InkBand,
    rough_x: usize,
    (y_top, y_bottom): (usize, usize),
) -> Option<usize> {
    const SEARCH_RIGHT: usize = 30;
    let y_top = y_top.min(mask.height().saturating_sub(1));
    let y_bottom = y_bottom.min(mask.height().saturating_sub(1));
    let x1 = (rough_x + SEARCH_RIGHT + 1).min(mask.width());

    let mut best_x = None;
    let mut best_run = 0;
    for x in rough_x..x1 {
        let mut run = 0;
        let mut max_run = 0;
        for row in y_top..=y_bottom {
            if mask.is_ink(row, x) {
                run += 1;
                max_run = max_run.max(run);
            } else {
                run = 0;
            }
        }
        if max_run > best_run {
            best_run = max_run;
            best_x = Some(x);
        }
    }
    best_x
}

fn locate_fine_barline_x(
    mask: &InkBand,
    band: (usize, usize),
    config: &DetectionConfig,
) -> Option<usize> {
    let rough_x = find_rough_barline_x(mask, band, config)?;
    find_fine_barline_x(mask, rough_x, band)
}

/// Confirms a system's barline via a two-phase check: a thin strip around
/// the fine barline column is horizontally dilated to bridge 1-2px wobble,
/// then a vertical morphological opening keeps only strokes continuous for
/// the whole band. The tallest surviving connected run must span at least
/// `barline_confirmation_ratio` of the band height.
fn confirm_system_barline(
    mask: &InkBand,
    y_top: usize,
    y_bottom: usize,
    config: &DetectionConfig,
) -> BarlineInfo {
    let Some(rough_x) = find_rough_barline_x(mask, (y_top, y_bottom), config) else {
        return BarlineInfo::none();
    };
    let Some(fine_x) = find_fine_barline_x(mask, rough_x, (y_top, y_bottom)) else {
        return BarlineInfo {
            x: None,
            span: None,
        };
    };

    let band_h = y_bottom - y_top + 1;
    let jitter = config.barline_jitter;
    let dilated = dilated_strip(mask, fine_x, jitter, y_top, y_bottom);
    let runs = vertical_runs(&dilated, band_h);
    let best = runs.into_iter().max_by_key(|&(_, len)| len);

    let span = best.and_then(|(start, len)| {
        if (len as f64) < band_h as f64 * config.barline_confirmation_ratio {
            None
        } else {
            Some((y_top + start, y_top + start + len))
        }
    });

    BarlineInfo {
        x: Some(fine_x),
        span,
    }
}

/// Builds a thin strip `±jitter` columns wide around `fine_x`, with a
/// horizontal dilation bridging 1-2px wobble.
fn dilated_strip(
    mask: &InkBand,
    fine_x: usize,
    jitter: usize,
    y_top: usize,
    y_bottom: usize,
) -> Vec<bool> {
    let x0 = fine_x.saturating_sub(jitter);
    let x1 = (fine_x + jitter + 1).min(mask.width());
    (y_top..=y_bottom.min(mask.height().saturating_sub(1)))
        .map(|row| (x0..x1).any(|col| mask.is_ink(row, col)))
        .collect()
}

/// Runs of `true` at least `band_h` long are the only ones an ideal
/// vertical opening would preserve; shorter runs are morphologically
/// erased. Returns `(start_offset, run_length)` pairs.
fn vertical_runs(column: &[bool], band_h: usize) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &v) in column.iter().enumerate() {
        match (v, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s >= band_h {
                    runs.push((s, i - s));
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if column.len() - s >= band_h {
            runs.push((s, column.len() - s));
        }
    }
    runs
}

/// Finds continuous vertical ink runs at `fine_x` across the whole page
/// (spec sec 4.6a, `find_barline_runs`), discarding runs shorter than
/// `min_barline_run_length`.
fn find_barline_runs(
    mask: &InkBand,
    fine_x: usize,
    config: &DetectionConfig,
) -> Vec<(usize, usize)> {
    let jitter = config.barline_jitter;
    let x0 = fine_x.saturating_sub(jitter);
    let x1 = (fine_x + jitter + 1).min(mask.width());
    let column: Vec<bool> = (0..mask.height())
        .map(|row| (x0..x1).any(|col| mask.is_ink(row, col)))
        .collect();

    let mut runs = Vec::new();
    let mut start = None;
    for (i, &v) in column.iter().enumerate() {
        match (v, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s >= config.min_barline_run_length {
                    runs.push((s, i - 1));
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if mask.height() - s >= config.min_barline_run_length {
            runs.push((s, mask.height() - 1));
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ink_band_with_vertical_line(height: usize, width: usize, x: usize) -> InkBand {
        let mut image = GrayImage::new(width as u32, height as u32);
        for row in 0..height {
            image.put_pixel(x as u32, row as u32, Luma([255]));
        }
        InkBand { image }
    }

    #[test]
    fn empty_staves_yields_no_systems() {
        let config = DetectionConfig::default();
        let (systems, info) = cluster_into_systems(&[], None, &config);
        assert!(systems.is_empty());
        assert!(info.is_empty());
    }

    #[test]
    fn gap_fallback_splits_on_large_gaps() {
        let config = DetectionConfig::default();
        let staves = vec![
            Stave::new([10, 14, 18, 22, 26]),
            Stave::new([30, 34, 38, 42, 46]),
            Stave::new([200, 204, 208, 212, 216]),
            Stave::new([220, 224, 228, 232, 236]),
        ];
        let (systems, info) = cluster_into_systems(&staves, None, &config);
        assert_eq!(systems.len(), 2);
        assert_eq!(info.len(), 2);
        assert!(info.iter().all(|i| !i.is_confirmed()));
    }

    #[test]
    fn single_staves_all_gap_are_one_system() {
        let config = DetectionConfig::default();
        let staves = vec![Stave::new([10, 14, 18, 22, 26])];
        let (systems, _info) = cluster_into_systems(&staves, None, &config);
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].staves.len(), 1);
    }

    #[test]
    fn find_rough_barline_x_locates_ink_column() {
        let config = DetectionConfig::default();
        let band = ink_band_with_vertical_line(100, 200, 40);
        let x = find_rough_barline_x(&band, (0, 99), &config);
        assert_eq!(x, Some(40));
    }
}
