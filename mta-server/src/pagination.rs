//! Pagination helpers for list endpoints

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageParams {
    /// Requested page size clamped to `[1, MAX_PER_PAGE]`
    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn paginate(&self, total_results: i64) -> Pagination {
        calculate_pagination(total_results, self.page.unwrap_or(1), self.per_page())
    }
}

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// Page is clamped to `[1, total_pages]`.
///
/// ```
/// use mta_server::pagination::calculate_pagination;
///
/// let p = calculate_pagination(45, 2, 20);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 20);
///
/// let p = calculate_pagination(45, 99, 20);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 40);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, per_page: i64) -> Pagination {
    let per_page = per_page.max(1);
    let total_pages = (total_results.max(0) + per_page - 1) / per_page;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * per_page;

    Pagination {
        page,
        per_page,
        total_pages,
        offset,
    }
}

/// One page of a list response
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total,
            total_pages: pagination.total_pages,
        }
    }
}
