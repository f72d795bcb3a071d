//! Position of a price inside the channel, on a 0-100 scale.
//!
//! 0 sits on the trough line, 100 on the peak line. Prices outside the
//! channel clamp to the nearest end. A day whose peak bound is not strictly
//! above its trough bound has no position.

/// `clamp(100 * (price - trough) / (peak - trough), 0, 100)`, or `None` when
/// the gap is not strictly positive or any input is non-finite.
pub fn channel_position(price: f64, trough: f64, peak: f64) -> Option<f64> {
    let gap = peak - trough;
    if !gap.is_finite() || !price.is_finite() || gap <= 0.0 {
        return None;
    }
    Some((100.0 * (price - trough) / gap).clamp(0.0, 100.0))
}

/// Positions for aligned price / bound slices. Output length is the shortest input.
pub fn normalize_positions(prices: &[f64], troughs: &[f64], peaks: &[f64]) -> Vec<Option<f64>> {
    prices
        .iter()
        .zip(troughs)
        .zip(peaks)
        .map(|((&price, &trough), &peak)| channel_position(price, trough, peak))
        .collect()
}

/// Inverse of [`channel_position`]: the price sitting at `position` percent
/// of the way from trough to peak.
pub fn price_for_position(position: f64, trough: f64, peak: f64) -> Option<f64> {
    let gap = peak - trough;
    if !gap.is_finite() || gap <= 0.0 {
        return None;
    }
    Some(trough + position / 100.0 * gap)
}
