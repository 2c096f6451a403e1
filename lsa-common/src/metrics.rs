//! Derived performance metrics
//!
//! Pure, stateless rate computations shared by single-report views and
//! aggregated summaries. Every division by zero yields `0.0`, never NaN or
//! infinity; callers that must tell "no data" apart from "0%" inspect the
//! denominator through [`Rate`] instead of the value.

use serde::Serialize;

/// A computed ratio together with whether its denominator had data
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    pub value: f64,
    pub has_data: bool,
}

impl Rate {
    /// `numerator / denominator * scale`, or 0 with `has_data = false`
    pub fn of(numerator: f64, denominator: f64, scale: f64) -> Self {
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            Self {
                value: 0.0,
                has_data: false,
            }
        } else {
            Self {
                value: numerator / denominator * scale,
                has_data: true,
            }
        }
    }
}

/// `numerator / denominator * 100`, 0 when the denominator is 0
pub fn percent(numerator: f64, denominator: f64) -> f64 {
    Rate::of(numerator, denominator, 100.0).value
}

/// `numerator / denominator`, 0 when the denominator is 0
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    Rate::of(numerator, denominator, 1.0).value
}

/// Orders per product click, in percent
pub fn conversion_rate(orders: i64, product_clicks: i64) -> f64 {
    percent(orders as f64, product_clicks as f64)
}

/// Product clicks per viewer, in percent
pub fn click_through_rate(product_clicks: i64, viewers: i64) -> f64 {
    percent(product_clicks as f64, viewers as f64)
}

/// Engaged viewers per viewer, in percent
pub fn engagement_rate(engaged_viewers: i64, viewers: i64) -> f64 {
    percent(engaged_viewers as f64, viewers as f64)
}

pub fn avg_order_value(revenue: f64, orders: i64) -> f64 {
    safe_div(revenue, orders as f64)
}

pub fn avg_revenue_per_buyer(revenue: f64, buyers: i64) -> f64 {
    safe_div(revenue, buyers as f64)
}

/// Average ticket per product: revenue per item sold
pub fn ticket_medio(revenue: f64, items_sold: i64) -> f64 {
    safe_div(revenue, items_sold as f64)
}

/// Percentage change from `previous` to `current`
///
/// `None` when the previous value is zero: growth from nothing has no
/// meaningful percentage and must not read as -100% or +infinity.
pub fn percent_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

/// Arithmetic mean, `None` for an empty input
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_rate() {
        assert_eq!(conversion_rate(20, 150), 20.0 / 150.0 * 100.0);
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        assert_eq!(conversion_rate(5, 0), 0.0);
        assert_eq!(click_through_rate(5, 0), 0.0);
        assert_eq!(engagement_rate(0, 0), 0.0);
        assert_eq!(avg_order_value(100.0, 0), 0.0);
        assert_eq!(avg_revenue_per_buyer(100.0, 0), 0.0);
        assert_eq!(ticket_medio(100.0, 0), 0.0);
    }

    #[test]
    fn test_rate_distinguishes_no_data_from_zero() {
        let no_data = Rate::of(0.0, 0.0, 100.0);
        let zero = Rate::of(0.0, 10.0, 100.0);
        assert_eq!(no_data.value, zero.value);
        assert!(!no_data.has_data);
        assert!(zero.has_data);
    }

    #[test]
    fn test_money_ratios() {
        assert_eq!(avg_order_value(500.0, 20), 25.0);
        assert_eq!(avg_revenue_per_buyer(500.0, 10), 50.0);
        assert_eq!(ticket_medio(90.0, 3), 30.0);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(150.0, 100.0), Some(50.0));
        assert_eq!(percent_change(0.0, 100.0), Some(-100.0));
        assert_eq!(percent_change(10.0, 0.0), None);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(vec![10.0, 20.0]), Some(15.0));
        assert_eq!(mean(Vec::<f64>::new()), None);
    }
}
