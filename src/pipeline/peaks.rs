//! Stage 3 — peak detection.
//!
//! Smooths the horizontal projection with a centred moving average, then
//! finds local maxima subject to a minimum distance between accepted peaks
//! and a minimum prominence relative to the projection's maximum.

/// Smooths `signal` with a centred moving average of `kernel_size` (forced
/// odd, minimum 3). Boundary windows are truncated to the in-bounds extent
/// rather than reflected or zero-padded — an accepted boundary semantics
/// per the pipeline's design notes.
pub fn moving_average(signal: &[f64], kernel_size: usize) -> Vec<f64> {
    let k = odd_at_least(kernel_size, 3);
    let half = k / 2;
    let n = signal.len();
    let mut out = vec![0.0; n];
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let window = &signal[lo..hi];
        out[i] = window.iter().sum::<f64>() / window.len() as f64;
    }
    out
}

/// Rounds `k` up to the nearest odd number `>= minimum`.
pub fn odd_at_least(k: usize, minimum: usize) -> usize {
    let k = k.max(minimum);
    if k % 2 == 0 {
        k + 1
    } else {
        k
    }
}

/// Finds local maxima in `signal` with prominence `>= min_prominence` and
/// at least `min_distance` rows between accepted peaks. Returns row indices
/// in ascending order.
pub fn find_peaks(signal: &[f64], min_distance: usize, min_prominence: f64) -> Vec<usize> {
    let candidates = local_maxima(signal);
    if candidates.is_empty() {
        return Vec::new();
    }

    let prominences = peak_prominences(signal, &candidates);
    let mut surviving: Vec<usize> = candidates
        .iter()
        .zip(prominences.iter())
        .filter(|&(_, &p)| p >= min_prominence)
        .map(|(&i, _)| i)
        .collect();

    surviving = select_by_distance(signal, &surviving, min_distance);
    surviving.sort_unstable();
    surviving
}

/// Local maxima, including the midpoint of flat plateaus that are higher
/// than both immediate neighbours.
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut maxima = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if signal[i] > signal[i - 1] {
            let mut j = i;
            while j + 1 < n && signal[j + 1] == signal[i] {
                j += 1;
            }
            if j + 1 < n && signal[j + 1] < signal[i] {
                maxima.push((i + j) / 2);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    maxima
}

/// Prominence of each peak: height above the highest of the two nearest
/// surrounding valleys, where a valley is the lowest point before
/// encountering a neighbouring point higher than the peak, or the signal
/// edge.
fn peak_prominences(signal: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let height = signal[peak];

            let mut left_min = height;
            let mut i = peak;
            while i > 0 {
                i -= 1;
                if signal[i] > height {
                    break;
                }
                left_min = left_min.min(signal[i]);
            }

            let mut right_min = height;
            let mut j = peak;
            while j + 1 < signal.len() {
                j += 1;
                if signal[j] > height {
                    break;
                }
                right_min = right_min.min(signal[j]);
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Greedily keeps the highest peaks first, discarding any not-yet-discarded
/// peak within `min_distance` rows of a taller one.
fn select_by_distance(signal: &[f64], peaks: &[usize], min_distance: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| signal[peaks[b]].total_cmp(&signal[peaks[a]]));

    let mut removed = vec![false; peaks.len()];
    for &idx in &order {
        if removed[idx] {
            continue;
        }
        for other in 0..peaks.len() {
            if other == idx || removed[other] {
                continue;
            }
            if peaks[idx].abs_diff(peaks[other]) < min_distance {
                removed[other] = true;
            }
        }
    }

    peaks
        .iter()
        .zip(removed.iter())
        .filter(|&(_, &r)| !r)
        .map(|(&p, _)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_at_least_rounds_up() {
        assert_eq!(odd_at_least(2, 3), 3);
        assert_eq!(odd_at_least(4, 3), 5);
        assert_eq!(odd_at_least(7, 3), 7);
    }

    #[test]
    fn moving_average_smooths_spike() {
        let signal = vec![0.0, 0.0, 10.0, 0.0, 0.0];
        let smoothed = moving_average(&signal, 3);
        assert!(smoothed[2] < 10.0);
        assert!(smoothed[2] > 0.0);
    }

    fn gaussian_bumps(height: usize, centres: &[usize], spread: f64) -> Vec<f64> {
        (0..height)
            .map(|y| {
                centres
                    .iter()
                    .map(|&c| {
                        let d = y as f64 - c as f64;
                        (-(d * d) / (2.0 * spread * spread)).exp()
                    })
                    .sum()
            })
            .collect()
    }

    #[test]
    fn finds_five_well_separated_bumps() {
        let signal = gaussian_bumps(200, &[20, 40, 60, 80, 100], 2.0);
        let peaks = find_peaks(&signal, 5, 0.15);
        assert_eq!(peaks, vec![20, 40, 60, 80, 100]);
    }

    #[test]
    fn distance_constraint_suppresses_close_duplicate() {
        let mut signal = gaussian_bumps(60, &[30], 2.0);
        signal[31] = signal[30] - 0.001; // near-duplicate right next to the true peak
        let peaks = find_peaks(&signal, 10, 0.1);
        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn low_prominence_bump_is_rejected() {
        let mut signal = gaussian_bumps(100, &[50], 3.0);
        // Tiny ripple nowhere near the prominence threshold.
        signal[10] = 0.01;
        let peaks = find_peaks(&signal, 3, 0.15);
        assert_eq!(peaks, vec![50]);
    }
}
