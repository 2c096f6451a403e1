//! Live performance reports

use chrono::{DateTime, Utc};
use lsa_common::{metrics, Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::{ProductLine, ProductLineInput};

/// Cost of one coin, in the store currency
///
/// `coinsCost` is always `coinsUsed * COIN_UNIT_COST` and cannot be set directly.
pub const COIN_UNIT_COST: f64 = 0.01;

/// Raw additive counters of one report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportCounters {
    pub revenue: f64,
    pub orders: i64,
    pub items_sold: i64,
    pub buyers: i64,
    pub viewers: i64,
    pub engaged_viewers: i64,
    pub views: i64,
    pub peak_viewers: i64,
    pub avg_watch_time_seconds: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub new_followers: i64,
    pub coupons_used: i64,
    pub coins_used: i64,
    pub product_impressions: i64,
    pub product_clicks: i64,
    pub add_to_cart: i64,
}

impl ReportCounters {
    pub fn validate(&self) -> Result<()> {
        if !self.revenue.is_finite() || self.revenue < 0.0 {
            return Err(Error::InvalidInput(format!(
                "revenue must be a non-negative amount: {}",
                self.revenue
            )));
        }
        for (field, value) in [
            ("orders", self.orders),
            ("itemsSold", self.items_sold),
            ("buyers", self.buyers),
            ("viewers", self.viewers),
            ("engagedViewers", self.engaged_viewers),
            ("views", self.views),
            ("peakViewers", self.peak_viewers),
            ("avgWatchTimeSeconds", self.avg_watch_time_seconds),
            ("likes", self.likes),
            ("shares", self.shares),
            ("comments", self.comments),
            ("newFollowers", self.new_followers),
            ("couponsUsed", self.coupons_used),
            ("coinsUsed", self.coins_used),
            ("productImpressions", self.product_impressions),
            ("productClicks", self.product_clicks),
            ("addToCart", self.add_to_cart),
        ] {
            if value < 0 {
                return Err(Error::InvalidInput(format!(
                    "{} must be non-negative: {}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    pub fn coins_cost(&self) -> f64 {
        self.coins_used as f64 * COIN_UNIT_COST
    }
}

/// How the report data was entered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntrySource {
    #[default]
    Manual,
    Ai,
}

impl EntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySource::Manual => "MANUAL",
            EntrySource::Ai => "AI",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "MANUAL" => Ok(EntrySource::Manual),
            "AI" => Ok(EntrySource::Ai),
            other => Err(Error::Internal(format!("Unknown entry source: {}", other))),
        }
    }
}

/// Performance data of one live, optionally linked to its session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveReport {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub session_id: Option<Uuid>,
    pub store: String,
    pub report_date: DateTime<Utc>,
    pub live_title: String,
    pub live_duration_seconds: i64,
    #[serde(flatten)]
    pub counters: ReportCounters,
    pub coins_cost: f64,
    /// Per-report conversion rate as captured at entry time
    pub conversion_rate: Option<f64>,
    pub entry_source: EntrySource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LiveReport {
    /// The report's own conversion rate: stored value, else computed
    pub fn own_conversion_rate(&self) -> f64 {
        self.conversion_rate.unwrap_or_else(|| {
            metrics::conversion_rate(self.counters.orders, self.counters.product_clicks)
        })
    }

    pub fn metrics(&self) -> ReportMetrics {
        let c = &self.counters;
        ReportMetrics {
            conversion_rate: self.own_conversion_rate(),
            click_through_rate: metrics::click_through_rate(c.product_clicks, c.viewers),
            engagement_rate: metrics::engagement_rate(c.engaged_viewers, c.viewers),
            avg_order_value: metrics::avg_order_value(c.revenue, c.orders),
            avg_revenue_per_buyer: metrics::avg_revenue_per_buyer(c.revenue, c.buyers),
        }
    }
}

/// Rates derived from a single report's counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub conversion_rate: f64,
    pub click_through_rate: f64,
    pub engagement_rate: f64,
    pub avg_order_value: f64,
    pub avg_revenue_per_buyer: f64,
}

/// Viewer acquisition channel breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSource {
    pub source: String,
    pub views: i64,
}

/// Report list entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(flatten)]
    pub report: LiveReport,
    pub metrics: ReportMetrics,
}

impl From<LiveReport> for ReportRow {
    fn from(report: LiveReport) -> Self {
        let metrics = report.metrics();
        Self { report, metrics }
    }
}

/// Report with everything attached to it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: LiveReport,
    pub metrics: ReportMetrics,
    pub products: Vec<ProductLine>,
    pub traffic_sources: Vec<TrafficSource>,
}

/// Create/replace payload for manual or AI-assisted entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub store: String,
    pub report_date: DateTime<Utc>,
    #[serde(default)]
    pub live_title: String,
    #[serde(default)]
    pub live_duration_seconds: i64,
    #[serde(flatten)]
    pub counters: ReportCounters,
    #[serde(default)]
    pub conversion_rate: Option<f64>,
    #[serde(default)]
    pub entry_source: EntrySource,
    #[serde(default)]
    pub products: Vec<ProductLineInput>,
    #[serde(default)]
    pub traffic_sources: Vec<TrafficSource>,
}

impl ReportInput {
    pub fn validate(&self) -> Result<()> {
        if self.live_duration_seconds < 0 {
            return Err(Error::InvalidInput(format!(
                "liveDurationSeconds must be non-negative: {}",
                self.live_duration_seconds
            )));
        }
        if let Some(rate) = self.conversion_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "conversionRate must be a non-negative number: {}",
                    rate
                )));
            }
        }
        self.counters.validate()?;
        self.products.iter().try_for_each(ProductLineInput::validate)?;

        let mut seen = std::collections::HashSet::new();
        for traffic in &self.traffic_sources {
            if traffic.source.trim().is_empty() {
                return Err(Error::InvalidInput("Traffic source name must not be empty".to_string()));
            }
            if traffic.views < 0 {
                return Err(Error::InvalidInput(format!(
                    "Traffic source views must be non-negative: {}",
                    traffic.views
                )));
            }
            if !seen.insert(traffic.source.trim()) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate traffic source: {}",
                    traffic.source
                )));
            }
        }
        Ok(())
    }
}
