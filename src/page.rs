//! Pagination value objects
//!
//! The query layer's closures for `loadNext`/`loadPrev` are replaced by
//! explicit cursor values carrying everything needed to load the next
//! page; callers hand the value back instead of holding a captured
//! environment.

use serde::Serialize;

use crate::error::SyncError;

/// Validated page request. `page` and `per_page` are 1-based and
/// positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: u64,
    pub per_page: u64,
}

impl Page {
    pub fn new(page: u64, per_page: u64) -> Result<Self, SyncError> {
        if page < 1 {
            return Err(SyncError::Query(format!("page must be >= 1, got {page}")));
        }
        if per_page < 1 {
            return Err(SyncError::Query(format!(
                "perPage must be >= 1, got {per_page}"
            )));
        }
        Ok(Self { page, per_page })
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }

    /// LIMIT/OFFSET clause for this page.
    pub fn to_sql(&self) -> String {
        format!("LIMIT {} OFFSET {}", self.limit(), self.offset())
    }
}

/// Position within a counted result set; replaces closure-based page
/// navigation with a value the caller passes back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl PageCursor {
    pub fn new(page: Page, total: u64) -> Self {
        Self {
            page: page.page,
            per_page: page.per_page,
            total,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page * self.per_page < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn next(&self) -> Option<Self> {
        self.has_next().then(|| Self {
            page: self.page + 1,
            ..*self
        })
    }

    pub fn prev(&self) -> Option<Self> {
        self.has_prev().then(|| Self {
            page: self.page - 1,
            ..*self
        })
    }

    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.per_page)
    }
}

/// Offset pagination over-fetches one row to learn whether more data
/// exists without a separate COUNT query.
pub fn over_fetch_limit(per_page: u64) -> u64 {
    per_page + 1
}

/// One page of rows plus the has-more flag derived from the over-fetch.
#[derive(Debug)]
pub struct OffsetPage<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Trim an over-fetched row set back down to the page size.
pub fn trim_over_fetch<T>(mut rows: Vec<T>, per_page: usize) -> OffsetPage<T> {
    let has_more = rows.len() > per_page;
    rows.truncate(per_page);
    OffsetPage {
        items: rows,
        has_more,
    }
}

/// Validate the bounds of a shuffle-range request.
pub fn validate_shuffle_range(low: i64, high: i64) -> Result<(), SyncError> {
    if high < low {
        return Err(SyncError::Query(format!(
            "inconsistent shuffle range: {low}..{high}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_sql() {
        let page = Page::new(1, 25).unwrap();
        assert_eq!(page.to_sql(), "LIMIT 25 OFFSET 0");
    }

    #[test]
    fn test_kth_page_offset() {
        let page = Page::new(4, 25).unwrap();
        assert_eq!(page.limit(), 25);
        assert_eq!(page.offset(), 75);
        assert_eq!(page.to_sql(), "LIMIT 25 OFFSET 75");
    }

    #[test]
    fn test_invalid_page_arguments() {
        assert!(matches!(Page::new(0, 10), Err(SyncError::Query(_))));
        assert!(matches!(Page::new(1, 0), Err(SyncError::Query(_))));
    }

    #[test]
    fn test_has_next_boundary() {
        let cursor = PageCursor::new(Page::new(2, 10).unwrap(), 20);
        assert!(!cursor.has_next(), "2*10 == 20 means no next page");
        assert!(cursor.has_prev());

        let cursor = PageCursor::new(Page::new(2, 10).unwrap(), 21);
        assert!(cursor.has_next());
        assert_eq!(cursor.total_pages(), 3);
    }

    #[test]
    fn test_cursor_navigation_is_value_based() {
        let first = PageCursor::new(Page::new(1, 10).unwrap(), 35);
        let second = first.next().unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(second.prev().unwrap(), first);
        assert!(first.prev().is_none());

        let last = PageCursor::new(Page::new(4, 10).unwrap(), 35);
        assert!(last.next().is_none());
    }

    #[test]
    fn test_over_fetch_trim() {
        assert_eq!(over_fetch_limit(10), 11);

        let page = trim_over_fetch(vec![1, 2, 3, 4], 3);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(page.has_more);

        let page = trim_over_fetch(vec![1, 2], 3);
        assert_eq!(page.items, vec![1, 2]);
        assert!(!page.has_more);
    }

    #[test]
    fn test_shuffle_range_validation() {
        assert!(validate_shuffle_range(1, 10).is_ok());
        assert!(validate_shuffle_range(5, 5).is_ok());
        assert!(matches!(
            validate_shuffle_range(10, 1),
            Err(SyncError::Query(_))
        ));
    }
}
