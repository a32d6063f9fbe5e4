//! Wilder's RSI over a series of candle closes
//!
//! Seeds the smoothed averages with a simple mean over the first `period`
//! deltas, then applies the recursive smoothing
//! `avg_t = (avg_{t-1} * (period - 1) + x_t) / period`.

/// Default RSI period
pub const DEFAULT_PERIOD: usize = 14;

/// Compute the RSI of the latest close in `closes`.
///
/// Returns `None` when fewer than `period + 1` closes are available.
/// Degenerate cases are exact: all-gain series yields 100, all-loss yields 0.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for pair in closes.windows(2) {
        let delta = pair[1] - pair[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    // Simple-average seed over the first `period` deltas
    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i]) / period as f64;
    }

    Some(rsi_from_averages(avg_gain, avg_loss))
}

/// Map smoothed averages to an RSI value with exact edge handling
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    if avg_gain == 0.0 {
        return 0.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
