//! Report aggregation: summaries, funnel, period comparison and leaderboards
//!
//! Two kinds of rate appear in a summary and they are not interchangeable:
//! - `avg*` fields average each report's own value
//! - every other rate is recomputed from the summed counters

use lsa_common::config::ReportingConfig;
use lsa_common::ranking::{self, Ranked};
use lsa_common::{metrics, Clock, DateRange};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::scope::{ReportQuery, ReportScope};
use crate::db;
use crate::db::reports::{ReportSortKey, SortOrder};
use crate::error::{ApiError, ApiResult};
use crate::models::{LiveReport, ProductLine, ProductSummary, ReportRow, TrafficSource};
use crate::pagination::{calculate_pagination, Page};

/// Totals and rates over a set of reports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub lives_count: i64,
    pub total_duration_seconds: i64,
    pub revenue: f64,
    pub orders: i64,
    pub items_sold: i64,
    pub buyers: i64,
    pub viewers: i64,
    pub engaged_viewers: i64,
    pub views: i64,
    /// Highest single-report peak
    pub peak_viewers: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub new_followers: i64,
    pub coupons_used: i64,
    pub coins_used: i64,
    pub coins_cost: f64,
    pub product_impressions: i64,
    pub product_clicks: i64,
    pub add_to_cart: i64,
    /// Mean of each report's own conversion rate
    pub avg_conversion_rate: f64,
    pub avg_watch_time_seconds: f64,
    /// `sum(orders) / sum(productClicks)`
    pub conversion_rate: f64,
    pub engagement_rate: f64,
    pub click_through_rate: f64,
    pub avg_order_value: f64,
    pub avg_revenue_per_buyer: f64,
}

impl ReportSummary {
    pub fn from_reports(reports: &[LiveReport]) -> Self {
        let mut s = ReportSummary {
            lives_count: reports.len() as i64,
            ..Default::default()
        };

        for report in reports {
            let c = &report.counters;
            s.total_duration_seconds += report.live_duration_seconds;
            s.revenue += c.revenue;
            s.orders += c.orders;
            s.items_sold += c.items_sold;
            s.buyers += c.buyers;
            s.viewers += c.viewers;
            s.engaged_viewers += c.engaged_viewers;
            s.views += c.views;
            s.peak_viewers = s.peak_viewers.max(c.peak_viewers);
            s.likes += c.likes;
            s.shares += c.shares;
            s.comments += c.comments;
            s.new_followers += c.new_followers;
            s.coupons_used += c.coupons_used;
            s.coins_used += c.coins_used;
            s.coins_cost += report.coins_cost;
            s.product_impressions += c.product_impressions;
            s.product_clicks += c.product_clicks;
            s.add_to_cart += c.add_to_cart;
        }

        s.avg_conversion_rate =
            metrics::mean(reports.iter().map(LiveReport::own_conversion_rate)).unwrap_or(0.0);
        s.avg_watch_time_seconds = metrics::mean(
            reports
                .iter()
                .map(|r| r.counters.avg_watch_time_seconds as f64),
        )
        .unwrap_or(0.0);

        s.conversion_rate = metrics::conversion_rate(s.orders, s.product_clicks);
        s.engagement_rate = metrics::engagement_rate(s.engaged_viewers, s.viewers);
        s.click_through_rate = metrics::click_through_rate(s.product_clicks, s.viewers);
        s.avg_order_value = metrics::avg_order_value(s.revenue, s.orders);
        s.avg_revenue_per_buyer = metrics::avg_revenue_per_buyer(s.revenue, s.buyers);
        s
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStage {
    pub stage: &'static str,
    pub value: i64,
    /// `None` when the previous stage is zero
    pub rate_from_previous: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    pub stages: Vec<FunnelStage>,
    /// Last stage over first stage; `None` when there were no viewers
    pub overall_conversion: Option<f64>,
}

impl Funnel {
    pub fn from_summary(summary: &ReportSummary) -> Self {
        let values = [
            ("viewers", summary.viewers),
            ("engagedViewers", summary.engaged_viewers),
            ("productClicks", summary.product_clicks),
            ("addToCart", summary.add_to_cart),
            ("orders", summary.orders),
        ];

        let mut stages = Vec::with_capacity(values.len());
        let mut previous: Option<i64> = None;
        for (stage, value) in values {
            let rate_from_previous = match previous {
                None => Some(100.0),
                Some(prev) => defined_rate(value, prev),
            };
            stages.push(FunnelStage {
                stage,
                value,
                rate_from_previous,
            });
            previous = Some(value);
        }

        Self {
            overall_conversion: defined_rate(summary.orders, summary.viewers),
            stages,
        }
    }
}

fn defined_rate(numerator: i64, denominator: i64) -> Option<f64> {
    let rate = metrics::Rate::of(numerator as f64, denominator as f64, 100.0);
    rate.has_data.then_some(rate.value)
}

/// Percentage change per metric; `None` when the previous value was zero
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDeltas {
    pub lives_count: Option<f64>,
    pub revenue: Option<f64>,
    pub orders: Option<f64>,
    pub items_sold: Option<f64>,
    pub viewers: Option<f64>,
    pub engaged_viewers: Option<f64>,
    pub new_followers: Option<f64>,
    pub product_clicks: Option<f64>,
    pub avg_conversion_rate: Option<f64>,
    pub engagement_rate: Option<f64>,
    pub click_through_rate: Option<f64>,
    pub avg_order_value: Option<f64>,
}

impl SummaryDeltas {
    pub fn between(current: &ReportSummary, previous: &ReportSummary) -> Self {
        let change = |c: f64, p: f64| metrics::percent_change(c, p);
        Self {
            lives_count: change(current.lives_count as f64, previous.lives_count as f64),
            revenue: change(current.revenue, previous.revenue),
            orders: change(current.orders as f64, previous.orders as f64),
            items_sold: change(current.items_sold as f64, previous.items_sold as f64),
            viewers: change(current.viewers as f64, previous.viewers as f64),
            engaged_viewers: change(current.engaged_viewers as f64, previous.engaged_viewers as f64),
            new_followers: change(current.new_followers as f64, previous.new_followers as f64),
            product_clicks: change(current.product_clicks as f64, previous.product_clicks as f64),
            avg_conversion_rate: change(current.avg_conversion_rate, previous.avg_conversion_rate),
            engagement_rate: change(current.engagement_rate, previous.engagement_rate),
            click_through_rate: change(current.click_through_rate, previous.click_through_rate),
            avg_order_value: change(current.avg_order_value, previous.avg_order_value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub previous_range: DateRange,
    pub previous: ReportSummary,
    pub deltas: SummaryDeltas,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficShare {
    pub source: String,
    pub views: i64,
    pub share: f64,
}

fn traffic_shares(totals: Vec<TrafficSource>) -> Vec<TrafficShare> {
    let all: i64 = totals.iter().map(|t| t.views).sum();
    totals
        .into_iter()
        .map(|t| TrafficShare {
            share: metrics::percent(t.views as f64, all as f64),
            source: t.source,
            views: t.views,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    /// Resolved period; absent for all time
    pub range: Option<DateRange>,
    pub summary: ReportSummary,
    pub funnel: Funnel,
    /// Absent for all time, which has no preceding period
    pub comparison: Option<PeriodComparison>,
    pub traffic_sources: Vec<TrafficShare>,
}

/// Columns the product leaderboard can be re-sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSortKey {
    Revenue,
    Orders,
    ItemsSold,
    ProductClicks,
    AddToCart,
    Appearances,
    ConversionRate,
    TicketMedio,
    Name,
}

impl ProductSortKey {
    pub fn parse(value: &str) -> ApiResult<Self> {
        match value {
            "revenue" => Ok(ProductSortKey::Revenue),
            "orders" => Ok(ProductSortKey::Orders),
            "itemsSold" => Ok(ProductSortKey::ItemsSold),
            "productClicks" => Ok(ProductSortKey::ProductClicks),
            "addToCart" => Ok(ProductSortKey::AddToCart),
            "appearances" => Ok(ProductSortKey::Appearances),
            "conversionRate" => Ok(ProductSortKey::ConversionRate),
            "ticketMedio" => Ok(ProductSortKey::TicketMedio),
            "name" => Ok(ProductSortKey::Name),
            other => Err(ApiError::Validation(format!("Unknown product sort column: {}", other))),
        }
    }

    fn compare(&self, a: &ProductSummary, b: &ProductSummary) -> std::cmp::Ordering {
        let numeric = |v: &ProductSummary| -> f64 {
            match self {
                ProductSortKey::Revenue => v.revenue,
                ProductSortKey::Orders => v.orders as f64,
                ProductSortKey::ItemsSold => v.items_sold as f64,
                ProductSortKey::ProductClicks => v.product_clicks as f64,
                ProductSortKey::AddToCart => v.add_to_cart as f64,
                ProductSortKey::Appearances => v.appearances as f64,
                ProductSortKey::ConversionRate => v.conversion_rate,
                ProductSortKey::TicketMedio => v.ticket_medio,
                ProductSortKey::Name => 0.0,
            }
        };
        match self {
            ProductSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            _ => numeric(a).total_cmp(&numeric(b)),
        }
    }
}

/// Report metrics the leaderboard can rank by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMetric {
    Revenue,
    Orders,
    Viewers,
    ItemsSold,
    NewFollowers,
    ConversionRate,
}

impl RankingMetric {
    pub fn parse(value: &str) -> ApiResult<Self> {
        match value {
            "revenue" => Ok(RankingMetric::Revenue),
            "orders" => Ok(RankingMetric::Orders),
            "viewers" => Ok(RankingMetric::Viewers),
            "itemsSold" => Ok(RankingMetric::ItemsSold),
            "newFollowers" => Ok(RankingMetric::NewFollowers),
            "conversionRate" => Ok(RankingMetric::ConversionRate),
            other => Err(ApiError::Validation(format!("Unknown ranking metric: {}", other))),
        }
    }

    pub fn value(&self, report: &LiveReport) -> f64 {
        let c = &report.counters;
        match self {
            RankingMetric::Revenue => c.revenue,
            RankingMetric::Orders => c.orders as f64,
            RankingMetric::Viewers => c.viewers as f64,
            RankingMetric::ItemsSold => c.items_sold as f64,
            RankingMetric::NewFollowers => c.new_followers as f64,
            RankingMetric::ConversionRate => report.own_conversion_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub report_id: Uuid,
    pub live_title: String,
    pub store: String,
    pub report_date: chrono::DateTime<chrono::Utc>,
    pub value: f64,
}

pub const DEFAULT_RANKING_LIMIT: i64 = 10;

#[derive(Hash, PartialEq, Eq)]
enum ProductKey {
    Group(String),
    Name(String),
}

/// Fold product lines into one row per canonical group or raw name
///
/// Rows appear in the order their first line was seen.
pub fn summarize_products(lines: &[ProductLine], group_names: &HashMap<String, String>) -> Vec<ProductSummary> {
    let mut rows: Vec<ProductSummary> = Vec::new();
    let mut reports: Vec<HashSet<Uuid>> = Vec::new();
    let mut index: HashMap<ProductKey, usize> = HashMap::new();

    for line in lines {
        let group = line
            .canonical_group_id
            .as_ref()
            .and_then(|gid| group_names.get(gid).map(|name| (gid, name)));
        let (key, display, group_id) = match group {
            Some((gid, name)) => (ProductKey::Group(gid.clone()), name.clone(), Some(gid.clone())),
            None => (ProductKey::Name(line.name.clone()), line.name.clone(), None),
        };

        let slot = *index.entry(key).or_insert_with(|| {
            rows.push(ProductSummary::new(display, group_id));
            reports.push(HashSet::new());
            rows.len() - 1
        });
        rows[slot].absorb(line);
        reports[slot].insert(line.report_id);
    }

    for (row, seen) in rows.iter_mut().zip(&reports) {
        row.finalize(seen.len() as i64);
    }
    rows
}

pub struct ReportAggregator {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    reporting: ReportingConfig,
}

impl ReportAggregator {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, reporting: ReportingConfig) -> Self {
        Self { db, clock, reporting }
    }

    /// Resolve request parameters against the current time
    pub fn scope(&self, owner_id: Uuid, query: &ReportQuery) -> ApiResult<ReportScope> {
        ReportScope::resolve(owner_id, query, self.clock.now(), self.reporting.utc_offset_minutes)
    }

    pub async fn summarize(&self, scope: &ReportScope) -> ApiResult<SummaryResponse> {
        let filter = scope.title_filter();
        let reports = db::reports::list_filtered(&self.db, &filter).await?;
        let summary = ReportSummary::from_reports(&reports);
        let funnel = Funnel::from_summary(&summary);

        let comparison = match scope.range {
            Some(range) => {
                let previous_range = range.previous();
                let previous_reports =
                    db::reports::list_filtered(&self.db, &filter.with_range(Some(previous_range))).await?;
                let previous = ReportSummary::from_reports(&previous_reports);
                Some(PeriodComparison {
                    previous_range,
                    deltas: SummaryDeltas::between(&summary, &previous),
                    previous,
                })
            }
            None => None,
        };

        let traffic_sources = traffic_shares(db::reports::traffic_totals(&self.db, &filter).await?);

        debug!(
            owner_id = %scope.owner_id,
            lives = summary.lives_count,
            compared = comparison.is_some(),
            "Summary computed"
        );

        Ok(SummaryResponse {
            range: scope.range,
            summary,
            funnel,
            comparison,
            traffic_sources,
        })
    }

    pub async fn list_reports(&self, scope: &ReportScope, query: &ReportQuery) -> ApiResult<Page<ReportRow>> {
        let sort = match query.sort_by.as_deref() {
            Some(key) => ReportSortKey::parse(key)?,
            None => ReportSortKey::ReportDate,
        };
        let order = match query.sort_order.as_deref() {
            Some(order) => SortOrder::parse(order)?,
            None => SortOrder::Desc,
        };

        let filter = scope.title_filter();
        let total = db::reports::count_filtered(&self.db, &filter).await?;
        let pagination = calculate_pagination(
            total,
            query.page.unwrap_or(1),
            query.limit,
            self.reporting.default_page_size,
            self.reporting.max_page_size,
        );
        let reports = db::reports::list_page(
            &self.db,
            &filter,
            sort,
            order,
            pagination.limit,
            pagination.offset,
        )
        .await?;

        Ok(Page {
            items: reports.into_iter().map(ReportRow::from).collect(),
            pagination,
        })
    }

    /// Every product row in scope, unranked, in first-seen order
    pub async fn product_summaries(&self, scope: &ReportScope) -> ApiResult<Vec<ProductSummary>> {
        let lines = db::products::list_in_scope(&self.db, &scope.product_filter()).await?;
        let group_names: HashMap<String, String> = db::products::list_groups(&self.db, scope.owner_id)
            .await?
            .into_iter()
            .map(|g| (g.id, g.canonical_name))
            .collect();

        Ok(summarize_products(&lines, &group_names)
            .into_iter()
            .filter(|row| {
                scope.matches_product_name(&row.name)
                    || row.merged_names.iter().any(|n| scope.matches_product_name(n))
            })
            .collect())
    }

    /// Product leaderboard; rank is by revenue, ties in first-seen order
    pub async fn list_products(
        &self,
        scope: &ReportScope,
        query: &ReportQuery,
    ) -> ApiResult<Page<Ranked<ProductSummary>>> {
        let sort = query.sort_by.as_deref().map(ProductSortKey::parse).transpose()?;
        let order = match query.sort_order.as_deref() {
            Some(order) => SortOrder::parse(order)?,
            None => SortOrder::Desc,
        };

        let rows = self.product_summaries(scope).await?;
        let mut ranked = ranking::rank(rows, |row| row.revenue);
        match (sort, order) {
            (None | Some(ProductSortKey::Revenue), SortOrder::Desc) => {}
            (Some(key), order) => ranked.sort_by(|a, b| {
                let ordering = key.compare(&a.item, &b.item);
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }),
            (None, SortOrder::Asc) => ranked.reverse(),
        }

        let pagination = calculate_pagination(
            ranked.len() as i64,
            query.page.unwrap_or(1),
            query.limit,
            self.reporting.default_page_size,
            self.reporting.max_page_size,
        );
        Ok(Page::from_sorted(ranked, pagination))
    }

    pub async fn ranking(&self, scope: &ReportScope, query: &ReportQuery) -> ApiResult<Vec<Ranked<RankingEntry>>> {
        let metric = match query.metric.as_deref() {
            Some(metric) => RankingMetric::parse(metric)?,
            None => RankingMetric::Revenue,
        };
        let limit = query
            .limit
            .unwrap_or(DEFAULT_RANKING_LIMIT)
            .clamp(1, self.reporting.max_page_size.max(1)) as usize;

        let reports = db::reports::list_filtered(&self.db, &scope.title_filter()).await?;
        let entries = reports
            .iter()
            .map(|report| RankingEntry {
                report_id: report.id,
                live_title: report.live_title.clone(),
                store: report.store.clone(),
                report_date: report.report_date,
                value: metric.value(report),
            })
            .collect();

        let mut ranked = ranking::rank(entries, |entry| entry.value);
        ranked.truncate(limit);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntrySource, ReportCounters};
    use chrono::{TimeZone, Utc};

    fn report(counters: ReportCounters, conversion_rate: Option<f64>) -> LiveReport {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        LiveReport {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            session_id: None,
            store: "Loja".to_string(),
            report_date: at,
            live_title: "Live".to_string(),
            live_duration_seconds: 3600,
            coins_cost: counters.coins_cost(),
            counters,
            conversion_rate,
            entry_source: EntrySource::Manual,
            created_at: at,
            updated_at: at,
        }
    }

    fn scenario_c() -> ReportCounters {
        ReportCounters {
            viewers: 1000,
            engaged_viewers: 300,
            product_clicks: 150,
            add_to_cart: 80,
            orders: 20,
            ..Default::default()
        }
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 0.01).unwrap_or(false)
    }

    #[test]
    fn test_funnel_rates_from_previous_stage() {
        let summary = ReportSummary::from_reports(&[report(scenario_c(), None)]);
        let funnel = Funnel::from_summary(&summary);

        let rates: Vec<Option<f64>> = funnel.stages.iter().map(|s| s.rate_from_previous).collect();
        for (rate, expected) in rates.iter().zip([100.0, 30.0, 50.0, 53.33, 25.0]) {
            assert!(close(*rate, expected), "{:?} != {}", rate, expected);
        }
        assert!(close(funnel.overall_conversion, 2.0));
    }

    #[test]
    fn test_funnel_rate_undefined_after_empty_stage() {
        let counters = ReportCounters {
            viewers: 100,
            engaged_viewers: 0,
            product_clicks: 0,
            ..Default::default()
        };
        let funnel = Funnel::from_summary(&ReportSummary::from_reports(&[report(counters, None)]));
        assert_eq!(funnel.stages[1].rate_from_previous, Some(0.0));
        assert_eq!(funnel.stages[2].rate_from_previous, None);
        assert_eq!(funnel.overall_conversion, Some(0.0));

        let empty = Funnel::from_summary(&ReportSummary::default());
        assert_eq!(empty.stages[0].rate_from_previous, Some(100.0));
        assert_eq!(empty.overall_conversion, None);
    }

    #[test]
    fn test_average_of_rates_differs_from_ratio_of_sums() {
        let a = ReportCounters {
            product_clicks: 10,
            orders: 5,
            ..Default::default()
        };
        let b = ReportCounters {
            product_clicks: 90,
            orders: 9,
            ..Default::default()
        };
        let summary = ReportSummary::from_reports(&[report(a, None), report(b, None)]);

        // (50% + 10%) / 2 versus 14 / 100
        assert!((summary.avg_conversion_rate - 30.0).abs() < 1e-9);
        assert!((summary.conversion_rate - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_stored_rate_used_for_average() {
        let summary = ReportSummary::from_reports(&[report(scenario_c(), Some(40.0)), report(scenario_c(), None)]);
        assert!((summary.avg_conversion_rate - (40.0 + 13.333333333333334) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_viewers_is_max_not_sum() {
        let a = ReportCounters {
            peak_viewers: 120,
            ..Default::default()
        };
        let b = ReportCounters {
            peak_viewers: 300,
            ..Default::default()
        };
        let summary = ReportSummary::from_reports(&[report(a, None), report(b, None)]);
        assert_eq!(summary.peak_viewers, 300);
        assert_eq!(summary.lives_count, 2);
        assert_eq!(summary.total_duration_seconds, 7200);
    }

    #[test]
    fn test_empty_summary_is_all_zero() {
        let summary = ReportSummary::from_reports(&[]);
        assert_eq!(summary, ReportSummary::default());
    }

    #[test]
    fn test_delta_undefined_when_previous_is_zero() {
        let current = ReportSummary::from_reports(&[report(scenario_c(), None)]);
        let previous = ReportSummary::default();
        let deltas = SummaryDeltas::between(&current, &previous);
        assert_eq!(deltas.viewers, None);
        assert_eq!(deltas.lives_count, None);

        let deltas = SummaryDeltas::between(&previous, &current);
        assert_eq!(deltas.viewers, Some(-100.0));
    }

    #[test]
    fn test_traffic_share_percent() {
        let shares = traffic_shares(vec![
            TrafficSource {
                source: "feed".to_string(),
                views: 300,
            },
            TrafficSource {
                source: "search".to_string(),
                views: 100,
            },
        ]);
        assert_eq!(shares[0].share, 75.0);
        assert_eq!(shares[1].share, 25.0);
    }

    fn line(report_id: Uuid, name: &str, group: Option<&str>, revenue: f64) -> ProductLine {
        ProductLine {
            id: Uuid::new_v4(),
            report_id,
            position: 0,
            name: name.to_string(),
            canonical_group_id: group.map(str::to_string),
            price: None,
            product_clicks: 10,
            add_to_cart: 5,
            orders: 2,
            items_sold: 2,
            revenue,
            external_item_id: None,
        }
    }

    #[test]
    fn test_products_fold_by_group_then_name() {
        let r1 = Uuid::new_v4();
        let r2 = Uuid::new_v4();
        let groups = HashMap::from([("g1".to_string(), "Kit 3 Camisetas".to_string())]);
        let lines = vec![
            line(r1, "Kit 3 Camisetas", Some("g1"), 100.0),
            line(r1, "Calça Jeans", None, 80.0),
            line(r2, "kit 3 camisetas", Some("g1"), 50.0),
            line(r2, "Calça Jeans", None, 20.0),
        ];

        let rows = summarize_products(&lines, &groups);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Kit 3 Camisetas");
        assert_eq!(rows[0].revenue, 150.0);
        assert_eq!(rows[0].appearances, 2);
        assert_eq!(rows[0].merged_names, vec!["Kit 3 Camisetas", "kit 3 camisetas"]);
        assert_eq!(rows[1].name, "Calça Jeans");
        assert_eq!(rows[1].appearances, 2);
    }

    #[test]
    fn test_unknown_group_falls_back_to_raw_name() {
        let r1 = Uuid::new_v4();
        let rows = summarize_products(&[line(r1, "Saia Midi", Some("gone"), 10.0)], &HashMap::new());
        assert_eq!(rows[0].name, "Saia Midi");
        assert_eq!(rows[0].canonical_group_id, None);
    }

    #[test]
    fn test_ranking_metric_names() {
        assert_eq!(RankingMetric::parse("itemsSold").unwrap(), RankingMetric::ItemsSold);
        assert!(RankingMetric::parse("likes").is_err());
        assert_eq!(ProductSortKey::parse("ticketMedio").unwrap(), ProductSortKey::TicketMedio);
    }
}
