//! Product lines and canonical product groups

use chrono::{DateTime, Utc};
use lsa_common::{metrics, Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product as entered on one report
///
/// Deduplication only ever sets or clears `canonical_group_id`; the name and
/// counters of a line are never rewritten by it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    pub id: Uuid,
    pub report_id: Uuid,
    pub position: i64,
    pub name: String,
    pub canonical_group_id: Option<String>,
    pub price: Option<f64>,
    pub product_clicks: i64,
    pub add_to_cart: i64,
    pub orders: i64,
    pub items_sold: i64,
    pub revenue: f64,
    pub external_item_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLineInput {
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub product_clicks: i64,
    #[serde(default)]
    pub add_to_cart: i64,
    #[serde(default)]
    pub orders: i64,
    #[serde(default)]
    pub items_sold: i64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub external_item_id: Option<String>,
}

impl ProductLineInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Product name must not be empty".to_string()));
        }
        for (field, value) in [
            ("productClicks", self.product_clicks),
            ("addToCart", self.add_to_cart),
            ("orders", self.orders),
            ("itemsSold", self.items_sold),
        ] {
            if value < 0 {
                return Err(Error::InvalidInput(format!(
                    "{} of '{}' must be non-negative: {}",
                    field, self.name, value
                )));
            }
        }
        for (field, value) in [("revenue", Some(self.revenue)), ("price", self.price)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "{} of '{}' must be a non-negative amount: {}",
                        field, self.name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Persisted record of one canonical group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeGroup {
    pub id: String,
    pub owner_id: Uuid,
    pub scope_key: String,
    pub canonical_name: String,
    pub merged_names: Vec<String>,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

/// One product leaderboard row: a canonical group or a raw product name
///
/// Counters are sums over member lines, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub name: String,
    pub canonical_group_id: Option<String>,
    /// Distinct original names aggregated into this row
    pub merged_names: Vec<String>,
    pub product_clicks: i64,
    pub add_to_cart: i64,
    pub orders: i64,
    pub items_sold: i64,
    pub revenue: f64,
    /// Number of distinct reports containing this product
    pub appearances: i64,
    pub conversion_rate: f64,
    pub ticket_medio: f64,
}

impl ProductSummary {
    pub fn new(name: String, canonical_group_id: Option<String>) -> Self {
        Self {
            name,
            canonical_group_id,
            merged_names: Vec::new(),
            product_clicks: 0,
            add_to_cart: 0,
            orders: 0,
            items_sold: 0,
            revenue: 0.0,
            appearances: 0,
            conversion_rate: 0.0,
            ticket_medio: 0.0,
        }
    }

    pub fn absorb(&mut self, line: &ProductLine) {
        self.product_clicks += line.product_clicks;
        self.add_to_cart += line.add_to_cart;
        self.orders += line.orders;
        self.items_sold += line.items_sold;
        self.revenue += line.revenue;
        if !self.merged_names.contains(&line.name) {
            self.merged_names.push(line.name.clone());
        }
    }

    /// Recompute rates after all lines are absorbed
    pub fn finalize(&mut self, appearances: i64) {
        self.appearances = appearances;
        self.conversion_rate = metrics::conversion_rate(self.orders, self.product_clicks);
        self.ticket_medio = metrics::ticket_medio(self.revenue, self.items_sold);
    }
}

/// One merged group in a dedupe result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGroupSummary {
    pub canonical_name: String,
    pub merged_names: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupResult {
    /// Distinct original product names in scope
    pub total_original: usize,
    /// Products remaining after grouping (merged groups plus untouched names)
    pub total_groups: usize,
    pub merged_groups: Vec<MergedGroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResult {
    pub cleared_lines: u64,
    pub removed_groups: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, revenue: f64, items: i64) -> ProductLine {
        ProductLine {
            id: Uuid::new_v4(),
            report_id: Uuid::new_v4(),
            position: 0,
            name: name.to_string(),
            canonical_group_id: None,
            price: None,
            product_clicks: 10,
            add_to_cart: 4,
            orders: 2,
            items_sold: items,
            revenue,
            external_item_id: None,
        }
    }

    #[test]
    fn test_summary_sums_members() {
        let mut summary = ProductSummary::new("Kit 3 Camisetas".to_string(), Some("g1".to_string()));
        summary.absorb(&line("Kit 3 Camisetas", 100.0, 2));
        summary.absorb(&line("kit 3 camisetas", 50.0, 1));
        summary.absorb(&line("Kit 3 Camisetas", 25.0, 1));
        summary.finalize(3);

        assert_eq!(summary.revenue, 175.0);
        assert_eq!(summary.items_sold, 4);
        assert_eq!(summary.product_clicks, 30);
        assert_eq!(summary.merged_names, vec!["Kit 3 Camisetas", "kit 3 camisetas"]);
        assert_eq!(summary.ticket_medio, 43.75);
        assert_eq!(summary.conversion_rate, 20.0);
    }

    #[test]
    fn test_line_input_validation() {
        let input: ProductLineInput =
            serde_json::from_str(r#"{"name": "Boné", "itemsSold": -2}"#).unwrap();
        assert!(input.validate().is_err());

        let input: ProductLineInput = serde_json::from_str(r#"{"name": "  "}"#).unwrap();
        assert!(input.validate().is_err());

        let input: ProductLineInput =
            serde_json::from_str(r#"{"name": "Boné", "revenue": 59.9, "price": 29.95}"#).unwrap();
        assert!(input.validate().is_ok());
    }
}
