//! Peak and trough detection on a dense 1-D signal.
//!
//! Candidates are strict local maxima (flat tops resolve to their middle
//! sample). They are then filtered in a fixed order, each stage seeing only the
//! survivors of the previous one:
//!
//! 1. distance: walking candidates from the tallest down, every lower candidate
//!    closer than `distance` samples to a kept one is discarded;
//! 2. prominence: the drop from the peak to the higher of the two minima found
//!    on either side before the signal climbs above the peak again;
//! 3. width: the span, interpolated between samples, over which the signal
//!    stays above `peak - prominence / 2`, bounded by the prominence bases.
//!
//! Troughs are the peaks of the negated signal.

use serde::{Deserialize, Serialize};

use super::error::{ExtremumKind, PowerbandError};

pub const DEFAULT_PROMINENCE: f64 = 0.28;
pub const DEFAULT_DISTANCE: usize = 600;
pub const DEFAULT_WIDTH: f64 = 5.0;

/// Minimum number of extrema per side needed to fit a channel line.
pub const MIN_EXTREMA: usize = 2;

const REL_HEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakParams {
    pub prominence: f64,
    pub distance: usize,
    pub width: f64,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            prominence: DEFAULT_PROMINENCE,
            distance: DEFAULT_DISTANCE,
            width: DEFAULT_WIDTH,
        }
    }
}

/// Detected extrema: strictly increasing indices into the analysed signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extrema {
    pub peaks: Vec<usize>,
    pub troughs: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
}

/// Indices of local maxima. A plateau counts once, at its middle sample
/// (rounded down). The first and last samples are never maxima.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Keep the highest-priority peaks such that no two kept peaks are closer
/// than `distance` samples. Returns the survivors in index order.
pub fn select_by_distance(peaks: &[usize], priority: &[f64], distance: usize) -> Vec<usize> {
    let n = peaks.len();
    let mut keep = vec![true; n];

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| priority[a].total_cmp(&priority[b]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < n && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Prominence of each peak together with the bases it was measured against.
pub fn peak_prominences(x: &[f64], peaks: &[usize]) -> Vec<Prominence> {
    peaks
        .iter()
        .map(|&peak| {
            let height = x[peak];

            let mut left_min = height;
            let mut left_base = peak;
            let mut i = peak;
            loop {
                if x[i] > height {
                    break;
                }
                if x[i] < left_min {
                    left_min = x[i];
                    left_base = i;
                }
                if i == 0 {
                    break;
                }
                i -= 1;
            }

            let mut right_min = height;
            let mut right_base = peak;
            for (j, &value) in x.iter().enumerate().skip(peak) {
                if value > height {
                    break;
                }
                if value < right_min {
                    right_min = value;
                    right_base = j;
                }
            }

            Prominence {
                prominence: height - left_min.max(right_min),
                left_base,
                right_base,
            }
        })
        .collect()
}

/// Width of each peak at `peak - prominence * REL_HEIGHT`, in samples.
pub fn peak_widths(x: &[f64], peaks: &[usize], prominences: &[Prominence]) -> Vec<f64> {
    peaks
        .iter()
        .zip(prominences)
        .map(|(&peak, prom)| {
            let height = x[peak] - prom.prominence * REL_HEIGHT;

            let mut i = peak;
            while prom.left_base < i && height < x[i] {
                i -= 1;
            }
            let mut left_ip = i as f64;
            if x[i] < height {
                left_ip += (height - x[i]) / (x[i + 1] - x[i]);
            }

            let mut i = peak;
            while i < prom.right_base && height < x[i] {
                i += 1;
            }
            let mut right_ip = i as f64;
            if x[i] < height {
                right_ip -= (height - x[i]) / (x[i - 1] - x[i]);
            }

            right_ip - left_ip
        })
        .collect()
}

/// Peaks of `x` satisfying the distance, prominence and width constraints.
pub fn find_peaks(x: &[f64], params: &PeakParams) -> Vec<usize> {
    let candidates = local_maxima(x);

    let heights: Vec<f64> = candidates.iter().map(|&p| x[p]).collect();
    let spaced = if params.distance > 1 {
        select_by_distance(&candidates, &heights, params.distance)
    } else {
        candidates
    };

    let prominences = peak_prominences(x, &spaced);
    let (prominent, prominences): (Vec<usize>, Vec<Prominence>) = spaced
        .into_iter()
        .zip(prominences)
        .filter(|(_, p)| p.prominence >= params.prominence)
        .unzip();

    let widths = peak_widths(x, &prominent, &prominences);
    prominent
        .into_iter()
        .zip(widths)
        .filter_map(|(p, w)| (w >= params.width).then_some(p))
        .collect()
}

/// Troughs of `x`: the peaks of `-x`.
pub fn find_troughs(x: &[f64], params: &PeakParams) -> Vec<usize> {
    let negated: Vec<f64> = x.iter().map(|v| -v).collect();
    find_peaks(&negated, params)
}

/// Detect peaks and troughs, failing when either side has fewer than
/// [`MIN_EXTREMA`] points.
pub fn detect_extrema(x: &[f64], params: &PeakParams) -> Result<Extrema, PowerbandError> {
    let peaks = find_peaks(x, params);
    if peaks.len() < MIN_EXTREMA {
        return Err(PowerbandError::TooFewExtrema {
            kind: ExtremumKind::Peak,
            found: peaks.len(),
            minimum: MIN_EXTREMA,
        });
    }

    let troughs = find_troughs(x, params);
    if troughs.len() < MIN_EXTREMA {
        return Err(PowerbandError::TooFewExtrema {
            kind: ExtremumKind::Trough,
            found: troughs.len(),
            minimum: MIN_EXTREMA,
        });
    }

    Ok(Extrema { peaks, troughs })
}
