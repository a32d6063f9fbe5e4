//! Buy/sell threshold evaluation with cooldown semantics
//!
//! A buy threshold is satisfied when the sampled buy price drops to or below
//! its value; a sell threshold when the sampled sell price rises to or above
//! its value. A satisfied threshold fires only while it is armed: never
//! triggered before, or past its cooldown when `reset_minutes > 0`. With
//! `reset_minutes == 0` a fired threshold stays inactive until an explicit
//! reset.
//!
//! All elapsed-time comparisons use absolute UTC instants.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use std::collections::BTreeMap;

use crate::models::{PriceSample, PriceThreshold, Side, ThresholdKey};

/// A threshold that fired for a given sample
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredThreshold {
    pub key: ThresholdKey,
    /// The sampled price that satisfied the condition
    pub price: f64,
}

/// Whether an armed check passes for a threshold at `now`
fn is_armed(threshold: &PriceThreshold, reset_minutes: u32, now: DateTime<Utc>) -> bool {
    match threshold.last_triggered {
        None => true,
        Some(last) => {
            reset_minutes > 0 && now.signed_duration_since(last) >= Duration::minutes(reset_minutes as i64)
        }
    }
}

/// Whether the price condition holds for a threshold
fn condition_holds(key: &ThresholdKey, sample: &PriceSample) -> bool {
    let price = match key.side {
        Side::Buy => sample.buy_price,
        Side::Sell => sample.sell_price,
    };
    let price = match Decimal::from_f64_retain(price) {
        Some(p) => p,
        None => return false,
    };
    match key.side {
        Side::Buy => price <= key.value,
        Side::Sell => price >= key.value,
    }
}

/// Evaluate one sample against every threshold, updating `last_triggered`
/// for each threshold that fires. Must be called with exclusive access to
/// the map so evaluation and mutation cannot interleave.
pub fn evaluate_sample(
    thresholds: &mut BTreeMap<ThresholdKey, PriceThreshold>,
    sample: &PriceSample,
    reset_minutes: u32,
    now: DateTime<Utc>,
) -> Vec<TriggeredThreshold> {
    let mut fired = Vec::new();

    for (key, threshold) in thresholds.iter_mut() {
        if !condition_holds(key, sample) {
            continue;
        }
        if !is_armed(threshold, reset_minutes, now) {
            continue;
        }

        threshold.last_triggered = Some(now);
        fired.push(TriggeredThreshold {
            key: *key,
            price: match key.side {
                Side::Buy => sample.buy_price,
                Side::Sell => sample.sell_price,
            },
        });
    }

    fired
}
