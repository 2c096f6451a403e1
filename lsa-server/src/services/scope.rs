//! Reporting scope shared by summaries, listings and deduplication

use chrono::{DateTime, Utc};
use lsa_common::{time, DateRange, PeriodSpec};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::reports::ReportFilter;
use crate::error::ApiResult;

/// Query parameters accepted by every reporting endpoint
///
/// Each endpoint reads the subset it needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub store: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub metric: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A caller's resolved reporting scope
#[derive(Debug, Clone, PartialEq)]
pub struct ReportScope {
    pub owner_id: Uuid,
    pub range: Option<DateRange>,
    pub store: Option<String>,
    pub search: Option<String>,
}

impl ReportScope {
    /// Resolve the named or custom period against `now` up front
    pub fn resolve(
        owner_id: Uuid,
        query: &ReportQuery,
        now: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> ApiResult<Self> {
        let spec = PeriodSpec::from_query(
            query.period.as_deref(),
            query.start_date.as_deref(),
            query.end_date.as_deref(),
        )?;
        let range = spec.resolve(now, utc_offset_minutes)?;

        Ok(Self {
            owner_id,
            range,
            store: non_empty(&query.store),
            search: non_empty(&query.search),
        })
    }

    /// Filter with `search` applied to report titles
    pub fn title_filter(&self) -> ReportFilter {
        ReportFilter {
            owner_id: self.owner_id,
            range: self.range,
            store: self.store.clone(),
            search: self.search.clone(),
        }
    }

    /// Filter over period and store only; `search` targets product names
    pub fn product_filter(&self) -> ReportFilter {
        ReportFilter {
            owner_id: self.owner_id,
            range: self.range,
            store: self.store.clone(),
            search: None,
        }
    }

    /// Case-insensitive substring match on a product name
    pub fn matches_product_name(&self, name: &str) -> bool {
        match &self.search {
            Some(search) => name.to_lowercase().contains(&search.to_lowercase()),
            None => true,
        }
    }

    /// Deterministic key naming the query that produced a merge
    pub fn scope_key(&self) -> String {
        let range = match &self.range {
            Some(range) => format!(
                "{}..{}",
                time::format_timestamp(range.start),
                time::format_timestamp(range.end)
            ),
            None => "all".to_string(),
        };
        format!(
            "range={};store={};search={}",
            range,
            self.store.as_deref().unwrap_or(""),
            self.search.as_deref().map(str::to_lowercase).unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_blank_parameters_are_ignored() {
        let query = ReportQuery {
            store: Some("  ".to_string()),
            search: Some(String::new()),
            ..Default::default()
        };
        let scope = ReportScope::resolve(Uuid::new_v4(), &query, now(), 0).unwrap();
        assert_eq!(scope.range, None);
        assert_eq!(scope.store, None);
        assert_eq!(scope.search, None);
        assert!(scope.matches_product_name("anything"));
    }

    #[test]
    fn test_scope_key_is_stable_per_query() {
        let owner = Uuid::new_v4();
        let query = ReportQuery {
            period: Some("7d".to_string()),
            store: Some("Loja Centro".to_string()),
            ..Default::default()
        };
        let a = ReportScope::resolve(owner, &query, now(), -180).unwrap();
        let b = ReportScope::resolve(owner, &query, now(), -180).unwrap();
        assert_eq!(a.scope_key(), b.scope_key());

        let all = ReportScope::resolve(owner, &ReportQuery::default(), now(), -180).unwrap();
        assert_ne!(a.scope_key(), all.scope_key());
    }

    #[test]
    fn test_product_search_is_case_insensitive() {
        let query = ReportQuery {
            search: Some("CAMISETA".to_string()),
            ..Default::default()
        };
        let scope = ReportScope::resolve(Uuid::new_v4(), &query, now(), 0).unwrap();
        assert!(scope.matches_product_name("Kit 3 Camisetas"));
        assert!(!scope.matches_product_name("Calça Jeans"));
        assert_eq!(scope.product_filter().search, None);
        assert_eq!(scope.title_filter().search.as_deref(), Some("CAMISETA"));
    }

    #[test]
    fn test_invalid_period_rejected() {
        let query = ReportQuery {
            period: Some("fortnight".to_string()),
            ..Default::default()
        };
        assert!(ReportScope::resolve(Uuid::new_v4(), &query, now(), 0).is_err());
    }
}
