//! Pagination constants and helpers shared by list endpoints.

use serde::Serialize;

/// Default annotations per page in the review list.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default number of change events returned by change listings.
pub const DEFAULT_CHANGE_LIMIT: i64 = 50;

/// Maximum number of change events per listing.
pub const MAX_CHANGE_LIMIT: i64 = 500;

/// Clamp a user-provided limit to `[1, max]`, using `default` when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Page-number based pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// 1-based page number, clamped into range.
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageInfo {
    /// Resolve a requested page against a total count.
    ///
    /// Out-of-range or missing page numbers fall back to the nearest valid
    /// page, so an empty result set still reports page 1.
    pub fn resolve(page: Option<i64>, per_page: i64, total: i64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = ((total + per_page - 1) / per_page).max(1);
        let page = page.unwrap_or(1).clamp(1, total_pages);
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}
