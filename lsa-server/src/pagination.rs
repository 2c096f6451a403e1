//! Pagination utilities for lsa-server

use serde::Serialize;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page after clamping
    pub limit: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Total number of rows in the result set
    pub total: i64,
    /// Offset for SQL LIMIT/OFFSET query
    #[serde(skip)]
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// `limit` falls back to `default_limit` when absent or non-positive and is
/// capped at `max_limit`. The page is clamped to `[1, total_pages]`.
///
/// # Examples
/// ```
/// use lsa_server::pagination::calculate_pagination;
///
/// // 45 results at 20 per page = 3 pages
/// let p = calculate_pagination(45, 2, Some(20), 20, 100);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 20);
/// ```
pub fn calculate_pagination(
    total_results: i64,
    requested_page: i64,
    requested_limit: Option<i64>,
    default_limit: i64,
    max_limit: i64,
) -> Pagination {
    let limit = requested_limit
        .filter(|l| *l > 0)
        .unwrap_or(default_limit)
        .clamp(1, max_limit.max(1));
    let total_pages = (total_results + limit - 1) / limit;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * limit;

    Pagination {
        page,
        limit,
        total_pages,
        total: total_results,
        offset,
    }
}

/// One page of results with its metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Slice an in-memory, already ordered list
    pub fn from_sorted(items: Vec<T>, pagination: Pagination) -> Self {
        let items = items
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Self { items, pagination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 2, Some(100), 20, 100);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_default_limit() {
        let p = calculate_pagination(45, 1, None, 20, 100);
        assert_eq!(p.limit, 20);
        assert_eq!(p.total_pages, 3);

        let p = calculate_pagination(45, 1, Some(0), 20, 100);
        assert_eq!(p.limit, 20);
    }

    #[test]
    fn test_pagination_limit_capped() {
        let p = calculate_pagination(1000, 1, Some(5000), 20, 100);
        assert_eq!(p.limit, 100);
        assert_eq!(p.total_pages, 10);
    }

    #[test]
    fn test_pagination_out_of_bounds_high() {
        let p = calculate_pagination(150, 99, Some(100), 20, 100);
        assert_eq!(p.page, 2); // Clamped to last page
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(150, 0, Some(100), 20, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, None, 20, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_page_from_sorted() {
        let p = calculate_pagination(5, 2, Some(2), 20, 100);
        let page = Page::from_sorted(vec![1, 2, 3, 4, 5], p);
        assert_eq!(page.items, vec![3, 4]);
    }
}
