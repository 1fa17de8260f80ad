use std::cmp::Ordering;

use crate::model::{EvaluatedTarget, QuoteResult, Target};

/// Display order of the evaluated targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending by signed ratio; targets below their price come first.
    Ratio,
    /// Ascending by distance to the price level; closest first.
    Distance,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ratio" => Some(Self::Ratio),
            "distance" => Some(Self::Distance),
            _ => None,
        }
    }
}

/// `(current - target) / current`, or `None` when either side is missing
/// or the current price is zero.
pub fn deviation_ratio(current_price: Option<f64>, target_price: Option<f64>) -> Option<f64> {
    let current = current_price?;
    let target = target_price?;
    if current == 0.0 || !current.is_finite() {
        return None;
    }
    Some((current - target) / current)
}

/// Signed distance to the price level `|target|`, relative to `current`.
///
/// Equals the deviation ratio for non-negative targets.
pub fn level_distance(current_price: Option<f64>, target_price: Option<f64>) -> Option<f64> {
    deviation_ratio(current_price, target_price.map(f64::abs))
}

/// Combine a target with its fetch result.
pub fn evaluate(target: Target, result: QuoteResult) -> EvaluatedTarget {
    let current = result.current_price();
    let deviation_ratio = deviation_ratio(current, target.target_price);
    let level_distance = level_distance(current, target.target_price);
    EvaluatedTarget {
        target,
        result,
        deviation_ratio,
        level_distance,
        triggered_today: false,
    }
}

fn sort_key(evaluated: &EvaluatedTarget, order: SortOrder) -> Option<f64> {
    match order {
        SortOrder::Ratio => evaluated.deviation_ratio,
        SortOrder::Distance => evaluated.level_distance.map(f64::abs),
    }
}

/// Stable sort; targets without a ratio always go last.
pub fn sort_targets(targets: &mut [EvaluatedTarget], order: SortOrder) {
    targets.sort_by(|a, b| match (sort_key(a, order), sort_key(b, order)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
