//! Stage 4 — stave clustering, with repair/trim/split group-size handling
//! (spec sec 4.4, 4.4a).

use crate::config::DetectionConfig;
use crate::types::Stave;

/// The minimum number of peaks needed to form even one stave.
pub const MIN_PEAKS_FOR_STAVE: usize = 5;
const LINES_PER_STAVE: usize = 5;

/// Groups ascending `peaks` into five-line staves, repairing, trimming, and
/// splitting groups as described in spec sec 4.4. Peaks that cannot be
/// placed into any valid stave are returned as orphans.
///
/// Returns `(staves, orphans)`. If `peaks.len() < MIN_PEAKS_FOR_STAVE`, all
/// peaks are orphaned and no staves are produced (the `InsufficientPeaks`
/// condition of spec sec 7, handled by the caller as non-fatal).
pub fn cluster_into_staves(
    peaks: &[usize],
    config: &DetectionConfig,
) -> (Vec<Stave>, Vec<usize>) {
    if peaks.len() < MIN_PEAKS_FOR_STAVE {
        return (Vec::new(), peaks.to_vec());
    }

    let gaps: Vec<usize> = peaks.windows(2).map(|w| w[1] - w[0]).collect();
    let mut sorted_gaps = gaps.clone();
    sorted_gaps.sort_unstable();
    let typical_spacing = sorted_gaps[sorted_gaps.len() / 4] as f64;

    let max_stave_span = typical_spacing * (LINES_PER_STAVE - 1) as f64 * (1.0 + config.repair_tolerance);
    let max_line_gap = typical_spacing * 2.0;

    let groups = split_into_groups(peaks, &gaps, max_line_gap, max_stave_span);
    log::debug!(
        "stave clustering: {} peaks -> {} candidate groups (typical spacing {typical_spacing})",
        peaks.len(),
        groups.len()
    );

    let mut staves = Vec::new();
    let mut orphans = Vec::new();
    for group in groups {
        classify_group(&group, typical_spacing, config, &mut staves, &mut orphans);
    }

    (staves, orphans)
}

/// Walks peaks left to right, starting a new group whenever the gap to the
/// next peak exceeds `max_line_gap`, or adding the next peak would push the
/// group's span past `max_stave_span`.
fn split_into_groups(
    peaks: &[usize],
    gaps: &[usize],
    max_line_gap: f64,
    max_stave_span: f64,
) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();
    let mut current = vec![peaks[0]];
    for (i, &gap) in gaps.iter().enumerate() {
        let span_with_next = (peaks[i + 1] - current[0]) as f64;
        if gap as f64 > max_line_gap || span_with_next > max_stave_span {
            groups.push(std::mem::take(&mut current));
        }
        current.push(peaks[i + 1]);
    }
    groups.push(current);
    groups
}

/// Classifies a single candidate group by size, per spec sec 4.4 step 6.
fn classify_group(
    group: &[usize],
    typical_spacing: f64,
    config: &DetectionConfig,
    staves: &mut Vec<Stave>,
    orphans: &mut Vec<usize>,
) {
    match group.len() {
        5 => staves.push(Stave::new(to_array(group))),
        3 | 4 => match repair_stave(group, typical_spacing, config.repair_tolerance) {
            Some(lines) => staves.push(Stave::new(lines)),
            None => orphans.extend_from_slice(group),
        },
        6 => staves.push(Stave::new(trim_stave(group))),
        n if n > 6 => {
            let (sub_staves, sub_orphans) = split_oversized_group(group, typical_spacing, config);
            staves.extend(sub_staves);
            orphans.extend(sub_orphans);
        }
        _ => orphans.extend_from_slice(group),
    }
}

/// Synthesises five evenly spaced rows spanning `group`, accepting only if
/// the implied spacing is within `tolerance` of `typical_spacing`.
fn repair_stave(group: &[usize], typical_spacing: f64, tolerance: f64) -> Option<[usize; 5]> {
    let span = (group[group.len() - 1] - group[0]) as f64;
    let implied_spacing = span / (LINES_PER_STAVE - 1) as f64;
    if typical_spacing > 0.0
        && ((implied_spacing - typical_spacing) / typical_spacing).abs() > tolerance
    {
        return None;
    }
    let first = group[0] as f64;
    let mut lines = [0usize; 5];
    for (i, line) in lines.iter_mut().enumerate() {
        *line = (first + i as f64 * implied_spacing).round() as usize;
    }
    Some(lines)
}

/// Drops the one line from a six-element group whose removal yields the
/// most uniform spacing among the remaining five.
fn trim_stave(group: &[usize]) -> [usize; 5] {
    let mut best: Option<([usize; 5], f64)> = None;
    for skip in 0..group.len() {
        let candidate: Vec<usize> = group
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != skip)
            .map(|(_, &v)| v)
            .collect();
        let variance = gap_variance(&candidate);
        if best.as_ref().is_none_or(|(_, v)| variance < *v) {
            best = Some((to_array(&candidate), variance));
        }
    }
    best.expect("group has at least one candidate").0
}

fn gap_variance(values: &[usize]) -> f64 {
    let gaps: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64
}

/// Splits a group with more than five peaks into stave-sized chunks
/// (spec sec 4.4a).
fn split_oversized_group(
    group: &[usize],
    typical_spacing: f64,
    config: &DetectionConfig,
) -> (Vec<Stave>, Vec<usize>) {
    let group_gaps: Vec<usize> = group.windows(2).map(|w| w[1] - w[0]).collect();
    let local_median = median(&group_gaps);

    let mut staves = Vec::new();
    let mut orphans = Vec::new();
    let mut sub_group = vec![group[0]];

    for (i, &gap) in group_gaps.iter().enumerate() {
        if sub_group.len() == LINES_PER_STAVE {
            staves.push(Stave::new(to_array(&sub_group)));
            sub_group = vec![group[i + 1]];
        } else if (gap as f64) > local_median * config.split_gap_multiplier {
            flush_sub_group(&sub_group, typical_spacing, config, &mut staves, &mut orphans);
            sub_group = vec![group[i + 1]];
        } else {
            sub_group.push(group[i + 1]);
        }
    }
    flush_sub_group(&sub_group, typical_spacing, config, &mut staves, &mut orphans);

    (staves, orphans)
}

/// Classifies a trailing sub-group from the splitting walk: exact size
/// accepted, 3-4 repaired, anything else orphaned.
fn flush_sub_group(
    sub_group: &[usize],
    typical_spacing: f64,
    config: &DetectionConfig,
    staves: &mut Vec<Stave>,
    orphans: &mut Vec<usize>,
) {
    match sub_group.len() {
        5 => staves.push(Stave::new(to_array(sub_group))),
        3 | 4 => match repair_stave(sub_group, typical_spacing, config.repair_tolerance) {
            Some(lines) => staves.push(Stave::new(lines)),
            None => orphans.extend_from_slice(sub_group),
        },
        _ => orphans.extend_from_slice(sub_group),
    }
}

fn median(values: &[usize]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    }
}

fn to_array(values: &[usize]) -> [usize; 5] {
    values.try_into().expect("expected exactly 5 rows")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaks_for_staves(starts: &[usize], spacing: usize) -> Vec<usize> {
        starts
            .iter()
            .flat_map(|&start| (0..5).map(move |i| start + i * spacing))
            .collect()
    }

    #[test]
    fn insufficient_peaks_orphans_everything() {
        let config = DetectionConfig::default();
        let (staves, orphans) = cluster_into_staves(&[1, 2, 3], &config);
        assert!(staves.is_empty());
        assert_eq!(orphans, vec![1, 2, 3]);
    }

    #[test]
    fn exact_five_line_group_is_accepted() {
        let config = DetectionConfig::default();
        let peaks = peaks_for_staves(&[10], 4);
        let (staves, orphans) = cluster_into_staves(&peaks, &config);
        assert_eq!(staves.len(), 1);
        assert_eq!(staves[0].lines, [10, 14, 18, 22, 26]);
        assert!(orphans.is_empty());
    }

    #[test]
    fn two_staves_separated_by_large_gap() {
        let config = DetectionConfig::default();
        let mut peaks = peaks_for_staves(&[10], 4);
        peaks.extend(peaks_for_staves(&[80], 4));
        let (staves, orphans) = cluster_into_staves(&peaks, &config);
        assert_eq!(staves.len(), 2);
        assert!(orphans.is_empty());
    }

    #[test]
    fn four_line_group_within_tolerance_is_repaired() {
        let config = DetectionConfig::default();
        // typical spacing established by a clean stave; test group has 4
        // lines spanning a plausible stave height with one missing line.
        let mut peaks = peaks_for_staves(&[10], 4);
        peaks.extend_from_slice(&[100, 104, 108, 116]); // missing line at 112
        let (staves, orphans) = cluster_into_staves(&peaks, &config);
        assert_eq!(staves.len(), 2);
        assert!(orphans.is_empty());
    }

    #[test]
    fn four_line_group_outside_tolerance_is_orphaned() {
        let config = DetectionConfig::default();
        let mut peaks = peaks_for_staves(&[10], 4);
        // implied spacing way off from typical: large gaps.
        peaks.extend_from_slice(&[100, 104, 200, 204]);
        let (staves, orphans) = cluster_into_staves(&peaks, &config);
        assert_eq!(staves.len(), 1);
        assert!(!orphans.is_empty());
    }

    #[test]
    fn six_line_group_is_trimmed_to_five() {
        let config = DetectionConfig::default();
        let mut peaks = peaks_for_staves(&[10], 4);
        // Six roughly-evenly-spaced lines plus one extra close to line 2.
        peaks.extend_from_slice(&[100, 104, 108, 109, 112, 116]);
        let (staves, orphans) = cluster_into_staves(&peaks, &config);
        assert_eq!(staves.len(), 2);
        assert_eq!(staves[1].lines.len(), 5);
        assert!(orphans.is_empty());
    }

    #[test]
    fn oversized_group_is_split_into_multiple_staves() {
        let config = DetectionConfig::default();
        // Seed typical spacing with one clean stave, then a 10-peak run
        // forming two adjacent staves with no gap between them.
        let mut peaks = peaks_for_staves(&[10], 4);
        peaks.extend(peaks_for_staves(&[100, 120], 4));
        let (staves, orphans) = cluster_into_staves(&peaks, &config);
        assert_eq!(staves.len(), 3);
        assert!(orphans.is_empty());
    }
}
