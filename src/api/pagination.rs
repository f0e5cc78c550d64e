use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const WINDOW_WIDTH: i64 = 5;

/// `?page=&page_size=` as sent by the client. Missing or non-positive values
/// fall back to the defaults; oversized pages are capped.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PaginationQuery {
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub total_elements: i64,
    pub windows: Vec<i64>,
}

/// How many pages to look ahead to the right of the current one.
pub fn wanted_right(width: i64, has_prev: bool) -> i64 {
    if has_prev {
        width / 2
    } else {
        width - 1
    }
}

/// Pages reachable to the right, given how many rows follow the current page.
/// A partial trailing page counts as a page.
pub fn pages_available(rows_after: i64, page_size: i64, wanted: i64) -> i64 {
    if rows_after <= 0 || page_size <= 0 || wanted <= 0 {
        return 0;
    }
    ((rows_after + page_size - 1) / page_size).min(wanted)
}

/// Page numbers to show around `current`, `width` wide where possible.
///
/// On the first page the window starts at 1 and extends only as far as pages
/// actually exist; on the last page it ends at `current`; otherwise `current`
/// sits in the middle, shifted left when there is little room on the right.
pub fn page_window_clamped(
    current: i64,
    width: i64,
    has_prev: bool,
    has_next: bool,
    next_pages_avail: i64,
) -> Vec<i64> {
    if width <= 0 {
        return Vec::new();
    }
    let current = current.max(1);

    if !has_prev {
        let span = (width - 1).min(next_pages_avail.max(0));
        return (1..=1 + span).collect();
    }

    if !has_next {
        let start = (current - (width - 1)).max(1);
        return (start..=current).collect();
    }

    let right = (width / 2).min(next_pages_avail.max(0));
    let mut end = current + right;
    let mut start = end - (width - 1);
    if start < 1 {
        start = 1;
        end = width;
    }
    (start..=end).collect()
}
