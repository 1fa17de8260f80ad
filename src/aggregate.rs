use error_stack::{Report, bail};

use crate::error::AggregateError;

/// Mean of the prices that survived filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub mean: f64,
    pub count: usize,
}

/// Average the prices with `0 < p < ceiling`.
///
/// Non-positive prices (suspended or untraded) and prices at or above the
/// ceiling (anomalous) are excluded.
pub fn mean_below_ceiling(prices: &[f64], ceiling: f64) -> Result<Aggregate, Report<AggregateError>> {
    let (sum, count) = prices
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0 && *p < ceiling)
        .fold((0.0, 0usize), |(sum, count), p| (sum + p, count + 1));

    if count == 0 {
        bail!(AggregateError::EmptyResult {
            fetched: prices.len(),
        });
    }

    Ok(Aggregate {
        mean: sum / count as f64,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn excludes_prices_at_or_above_ceiling() {
        let agg = mean_below_ceiling(&[10.0, 20.0, 9999.0], 1000.0).unwrap();
        assert!((agg.mean - 15.0).abs() < EPSILON);
        assert_eq!(agg.count, 2);
    }

    #[test]
    fn excludes_non_positive_prices() {
        let agg = mean_below_ceiling(&[0.0, -5.0, 100.0, 120.0, 140.0], 1000.0).unwrap();
        assert!((agg.mean - 120.0).abs() < EPSILON);
        assert_eq!(agg.count, 3);
    }

    #[test]
    fn ceiling_is_exclusive() {
        let agg = mean_below_ceiling(&[1000.0, 999.5], 1000.0).unwrap();
        assert_eq!(agg.count, 1);
        assert!((agg.mean - 999.5).abs() < EPSILON);
    }

    #[test]
    fn mean_matches_filtered_subset() {
        let prices = [105.2, 0.0, 131.7, 2500.0, 98.4, 117.0, -1.0, 143.9];
        let kept: Vec<f64> = prices
            .iter()
            .copied()
            .filter(|p| *p > 0.0 && *p < 1000.0)
            .collect();
        let expected = kept.iter().sum::<f64>() / kept.len() as f64;

        let agg = mean_below_ceiling(&prices, 1000.0).unwrap();
        assert_eq!(agg.count, kept.len());
        assert!((agg.mean - expected).abs() < EPSILON);
    }

    #[test]
    fn empty_subset_is_error_not_nan() {
        let err = mean_below_ceiling(&[0.0, 5000.0], 1000.0).unwrap_err();
        assert!(matches!(
            err.current_context(),
            AggregateError::EmptyResult { fetched: 2 }
        ));
    }

    #[test]
    fn empty_input_is_error() {
        assert!(mean_below_ceiling(&[], 1000.0).is_err());
    }
}
