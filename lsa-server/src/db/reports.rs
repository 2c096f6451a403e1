//! Live report persistence and filtered queries

use lsa_common::{time, DateRange, Error, Result};
use sqlx::{sqlite::SqliteRow, Executor, QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{get_optional_uuid, get_timestamp, get_uuid, like_pattern};
use crate::models::{EntrySource, LiveReport, ReportCounters, TrafficSource};

const REPORT_COLUMNS: &str = r#"
    r.id, r.owner_id, r.session_id, r.store, r.report_date, r.live_title, r.live_duration_seconds,
    r.revenue, r.orders, r.items_sold, r.buyers, r.viewers, r.engaged_viewers, r.views,
    r.peak_viewers, r.avg_watch_time_seconds, r.likes, r.shares, r.comments, r.new_followers,
    r.coupons_used, r.coins_used, r.coins_cost, r.product_impressions, r.product_clicks,
    r.add_to_cart, r.conversion_rate, r.entry_source, r.created_at, r.updated_at
"#;

/// Which reports an aggregate or listing covers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub owner_id: Uuid,
    pub range: Option<DateRange>,
    pub store: Option<String>,
    /// Case-insensitive substring of the live title
    pub search: Option<String>,
}

impl ReportFilter {
    /// Same filter over a different date range
    pub fn with_range(&self, range: Option<DateRange>) -> Self {
        Self {
            range,
            ..self.clone()
        }
    }

    /// Append `WHERE ...` over table alias `r`
    pub(crate) fn push_where<'a>(&'a self, builder: &mut QueryBuilder<'a, Sqlite>) {
        builder.push(" WHERE r.owner_id = ");
        builder.push_bind(self.owner_id.to_string());
        if let Some(range) = &self.range {
            builder.push(" AND r.report_date >= ");
            builder.push_bind(time::format_timestamp(range.start));
            builder.push(" AND r.report_date < ");
            builder.push_bind(time::format_timestamp(range.end));
        }
        if let Some(store) = &self.store {
            builder.push(" AND r.store = ");
            builder.push_bind(store.as_str());
        }
        if let Some(search) = &self.search {
            // Both sides are Unicode-lowercased; LIKE alone folds ASCII only
            builder.push(" AND r.live_title_folded LIKE ");
            builder.push_bind(like_pattern(&search.to_lowercase()));
            builder.push(" ESCAPE '\\'");
        }
    }
}

/// Sortable report columns, stored or derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSortKey {
    ReportDate,
    LiveTitle,
    Store,
    LiveDurationSeconds,
    Revenue,
    Orders,
    ItemsSold,
    Buyers,
    Viewers,
    Views,
    PeakViewers,
    Likes,
    NewFollowers,
    ProductClicks,
    AddToCart,
    CoinsUsed,
    ConversionRate,
    EngagementRate,
    ClickThroughRate,
    AvgOrderValue,
    CreatedAt,
}

impl ReportSortKey {
    pub fn parse(value: &str) -> Result<Self> {
        let key = match value {
            "reportDate" => ReportSortKey::ReportDate,
            "liveTitle" => ReportSortKey::LiveTitle,
            "store" => ReportSortKey::Store,
            "liveDurationSeconds" => ReportSortKey::LiveDurationSeconds,
            "revenue" => ReportSortKey::Revenue,
            "orders" => ReportSortKey::Orders,
            "itemsSold" => ReportSortKey::ItemsSold,
            "buyers" => ReportSortKey::Buyers,
            "viewers" => ReportSortKey::Viewers,
            "views" => ReportSortKey::Views,
            "peakViewers" => ReportSortKey::PeakViewers,
            "likes" => ReportSortKey::Likes,
            "newFollowers" => ReportSortKey::NewFollowers,
            "productClicks" => ReportSortKey::ProductClicks,
            "addToCart" => ReportSortKey::AddToCart,
            "coinsUsed" => ReportSortKey::CoinsUsed,
            "conversionRate" => ReportSortKey::ConversionRate,
            "engagementRate" => ReportSortKey::EngagementRate,
            "clickThroughRate" => ReportSortKey::ClickThroughRate,
            "avgOrderValue" => ReportSortKey::AvgOrderValue,
            "createdAt" => ReportSortKey::CreatedAt,
            other => return Err(Error::InvalidInput(format!("Unknown sort column: {}", other))),
        };
        Ok(key)
    }

    /// SQL expression over alias `r`; derived rates mirror the metrics module
    fn expression(&self) -> &'static str {
        match self {
            ReportSortKey::ReportDate => "r.report_date",
            ReportSortKey::LiveTitle => "r.live_title",
            ReportSortKey::Store => "r.store",
            ReportSortKey::LiveDurationSeconds => "r.live_duration_seconds",
            ReportSortKey::Revenue => "r.revenue",
            ReportSortKey::Orders => "r.orders",
            ReportSortKey::ItemsSold => "r.items_sold",
            ReportSortKey::Buyers => "r.buyers",
            ReportSortKey::Viewers => "r.viewers",
            ReportSortKey::Views => "r.views",
            ReportSortKey::PeakViewers => "r.peak_viewers",
            ReportSortKey::Likes => "r.likes",
            ReportSortKey::NewFollowers => "r.new_followers",
            ReportSortKey::ProductClicks => "r.product_clicks",
            ReportSortKey::AddToCart => "r.add_to_cart",
            ReportSortKey::CoinsUsed => "r.coins_used",
            ReportSortKey::ConversionRate => {
                "COALESCE(r.conversion_rate, CASE WHEN r.product_clicks > 0 THEN r.orders * 100.0 / r.product_clicks ELSE 0 END)"
            }
            ReportSortKey::EngagementRate => {
                "CASE WHEN r.viewers > 0 THEN r.engaged_viewers * 100.0 / r.viewers ELSE 0 END"
            }
            ReportSortKey::ClickThroughRate => {
                "CASE WHEN r.viewers > 0 THEN r.product_clicks * 100.0 / r.viewers ELSE 0 END"
            }
            ReportSortKey::AvgOrderValue => {
                "CASE WHEN r.orders > 0 THEN r.revenue * 1.0 / r.orders ELSE 0 END"
            }
            ReportSortKey::CreatedAt => "r.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::InvalidInput(format!("Unknown sort order: {}", other))),
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

fn report_from_row(row: &SqliteRow) -> Result<LiveReport> {
    let entry_source: String = row.try_get("entry_source")?;
    Ok(LiveReport {
        id: get_uuid(row, "id")?,
        owner_id: get_uuid(row, "owner_id")?,
        session_id: get_optional_uuid(row, "session_id")?,
        store: row.try_get("store")?,
        report_date: get_timestamp(row, "report_date")?,
        live_title: row.try_get("live_title")?,
        live_duration_seconds: row.try_get("live_duration_seconds")?,
        counters: ReportCounters {
            revenue: row.try_get("revenue")?,
            orders: row.try_get("orders")?,
            items_sold: row.try_get("items_sold")?,
            buyers: row.try_get("buyers")?,
            viewers: row.try_get("viewers")?,
            engaged_viewers: row.try_get("engaged_viewers")?,
            views: row.try_get("views")?,
            peak_viewers: row.try_get("peak_viewers")?,
            avg_watch_time_seconds: row.try_get("avg_watch_time_seconds")?,
            likes: row.try_get("likes")?,
            shares: row.try_get("shares")?,
            comments: row.try_get("comments")?,
            new_followers: row.try_get("new_followers")?,
            coupons_used: row.try_get("coupons_used")?,
            coins_used: row.try_get("coins_used")?,
            product_impressions: row.try_get("product_impressions")?,
            product_clicks: row.try_get("product_clicks")?,
            add_to_cart: row.try_get("add_to_cart")?,
        },
        coins_cost: row.try_get("coins_cost")?,
        conversion_rate: row.try_get("conversion_rate")?,
        entry_source: EntrySource::parse(&entry_source)?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

pub async fn get_owned<'e, E>(executor: E, report_id: Uuid, owner_id: Uuid) -> Result<Option<LiveReport>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM live_reports r WHERE r.id = ? AND r.owner_id = ?",
        REPORT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(report_id.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(report_from_row).transpose()
}

/// Whether some report other than `except` is already linked to the session
pub async fn session_has_report<'e, E>(
    executor: E,
    session_id: Uuid,
    except: Option<Uuid>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM live_reports WHERE session_id = ? AND id IS NOT ?",
    )
    .bind(session_id.to_string())
    .bind(except.map(|id| id.to_string()))
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// Insert or fully replace a report's own row
///
/// `coins_cost` is always derived from `coins_used`.
pub async fn upsert_report(conn: &mut SqliteConnection, report: &LiveReport) -> Result<()> {
    let c = &report.counters;
    sqlx::query(
        r#"
        INSERT INTO live_reports (
            id, owner_id, session_id, store, report_date, live_title, live_title_folded,
            live_duration_seconds, revenue, orders, items_sold, buyers, viewers, engaged_viewers,
            views, peak_viewers, avg_watch_time_seconds, likes, shares, comments, new_followers,
            coupons_used, coins_used, coins_cost, product_impressions, product_clicks,
            add_to_cart, conversion_rate, entry_source, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            session_id = excluded.session_id,
            store = excluded.store,
            report_date = excluded.report_date,
            live_title = excluded.live_title,
            live_title_folded = excluded.live_title_folded,
            live_duration_seconds = excluded.live_duration_seconds,
            revenue = excluded.revenue,
            orders = excluded.orders,
            items_sold = excluded.items_sold,
            buyers = excluded.buyers,
            viewers = excluded.viewers,
            engaged_viewers = excluded.engaged_viewers,
            views = excluded.views,
            peak_viewers = excluded.peak_viewers,
            avg_watch_time_seconds = excluded.avg_watch_time_seconds,
            likes = excluded.likes,
            shares = excluded.shares,
            comments = excluded.comments,
            new_followers = excluded.new_followers,
            coupons_used = excluded.coupons_used,
            coins_used = excluded.coins_used,
            coins_cost = excluded.coins_cost,
            product_impressions = excluded.product_impressions,
            product_clicks = excluded.product_clicks,
            add_to_cart = excluded.add_to_cart,
            conversion_rate = excluded.conversion_rate,
            entry_source = excluded.entry_source,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(report.id.to_string())
    .bind(report.owner_id.to_string())
    .bind(report.session_id.map(|id| id.to_string()))
    .bind(&report.store)
    .bind(time::format_timestamp(report.report_date))
    .bind(&report.live_title)
    .bind(report.live_title.to_lowercase())
    .bind(report.live_duration_seconds)
    .bind(c.revenue)
    .bind(c.orders)
    .bind(c.items_sold)
    .bind(c.buyers)
    .bind(c.viewers)
    .bind(c.engaged_viewers)
    .bind(c.views)
    .bind(c.peak_viewers)
    .bind(c.avg_watch_time_seconds)
    .bind(c.likes)
    .bind(c.shares)
    .bind(c.comments)
    .bind(c.new_followers)
    .bind(c.coupons_used)
    .bind(c.coins_used)
    .bind(c.coins_cost())
    .bind(c.product_impressions)
    .bind(c.product_clicks)
    .bind(c.add_to_cart)
    .bind(report.conversion_rate)
    .bind(report.entry_source.as_str())
    .bind(time::format_timestamp(report.created_at))
    .bind(time::format_timestamp(report.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Product lines and traffic sources cascade with the report
pub async fn delete_report<'e, E>(executor: E, report_id: Uuid, owner_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM live_reports WHERE id = ? AND owner_id = ?")
        .bind(report_id.to_string())
        .bind(owner_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn replace_traffic_sources(
    conn: &mut SqliteConnection,
    report_id: Uuid,
    sources: &[TrafficSource],
) -> Result<()> {
    sqlx::query("DELETE FROM report_traffic_sources WHERE report_id = ?")
        .bind(report_id.to_string())
        .execute(&mut *conn)
        .await?;

    for source in sources {
        sqlx::query("INSERT INTO report_traffic_sources (report_id, source, views) VALUES (?, ?, ?)")
            .bind(report_id.to_string())
            .bind(source.source.trim())
            .bind(source.views)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub async fn list_traffic_sources<'e, E>(executor: E, report_id: Uuid) -> Result<Vec<TrafficSource>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT source, views FROM report_traffic_sources WHERE report_id = ? ORDER BY views DESC, source",
    )
    .bind(report_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(TrafficSource {
                source: row.try_get("source")?,
                views: row.try_get("views")?,
            })
        })
        .collect()
}

/// Every matching report in first-seen order (report date, then id)
pub async fn list_filtered<'e, E>(executor: E, filter: &ReportFilter) -> Result<Vec<LiveReport>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM live_reports r", REPORT_COLUMNS));
    filter.push_where(&mut builder);
    builder.push(" ORDER BY r.report_date, r.id");

    let rows = builder.build().fetch_all(executor).await?;
    rows.iter().map(report_from_row).collect()
}

pub async fn count_filtered<'e, E>(executor: E, filter: &ReportFilter) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM live_reports r");
    filter.push_where(&mut builder);

    let count: i64 = builder.build_query_scalar().fetch_one(executor).await?;
    Ok(count)
}

/// One page of matching reports; ties on the sort column fall back to id
pub async fn list_page<'e, E>(
    executor: E,
    filter: &ReportFilter,
    sort: ReportSortKey,
    order: SortOrder,
    limit: i64,
    offset: i64,
) -> Result<Vec<LiveReport>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM live_reports r", REPORT_COLUMNS));
    filter.push_where(&mut builder);
    builder.push(format!(" ORDER BY {} {}, r.id ASC", sort.expression(), order.sql()));
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows = builder.build().fetch_all(executor).await?;
    rows.iter().map(report_from_row).collect()
}

/// Views per acquisition channel summed over matching reports
pub async fn traffic_totals<'e, E>(executor: E, filter: &ReportFilter) -> Result<Vec<TrafficSource>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT t.source AS source, SUM(t.views) AS views \
         FROM report_traffic_sources t JOIN live_reports r ON r.id = t.report_id",
    );
    filter.push_where(&mut builder);
    builder.push(" GROUP BY t.source ORDER BY views DESC, t.source");

    let rows = builder.build().fetch_all(executor).await?;
    rows.iter()
        .map(|row| {
            Ok(TrafficSource {
                source: row.try_get("source")?,
                views: row.try_get("views")?,
            })
        })
        .collect()
}

