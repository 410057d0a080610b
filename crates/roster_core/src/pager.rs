//! Page requests, page results and plan pagination.
//!
//! # Responsibility
//! - Validate page index/size before any SQL runs.
//! - Run a content plan window and its count plan, and wrap both in a `Page`.
//!
//! # Invariants
//! - `size > 0`, `page >= 0`, and `page * size` fits in `i64`.
//! - The count plan runs once per call; totals are never reused.
//! - Content and count read one snapshot: a deferred read transaction is
//!   opened when the connection is in autocommit mode, otherwise the caller's
//!   transaction is reused.
//! - Pages past the end have empty content and correct totals.

use crate::error::{RepoError, RepoResult};
use crate::query::builder::QueryPlan;
use crate::query::filter::Sort;
use crate::store::{query_count, query_rows};
use log::debug;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use serde::Serialize;

/// Zero-based page index, page size and ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    size: i64,
    sort: Sort,
}

impl PageRequest {
    /// Unsorted request for page `page` of `size` records.
    ///
    /// # Errors
    /// - `InvalidArgument` when `size <= 0`, `page < 0` or the offset overflows.
    pub fn of(page: i64, size: i64) -> RepoResult<Self> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: i64, size: i64, sort: Sort) -> RepoResult<Self> {
        if size <= 0 {
            return Err(RepoError::InvalidArgument(format!(
                "page size must be positive, got {size}"
            )));
        }
        if page < 0 {
            return Err(RepoError::InvalidArgument(format!(
                "page index must not be negative, got {page}"
            )));
        }
        if page.checked_mul(size).is_none() {
            return Err(RepoError::InvalidArgument(format!(
                "page {page} with size {size} overflows the row offset"
            )));
        }
        Ok(Self { page, size, sort })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn offset(&self) -> i64 {
        self.page * self.size
    }

    /// Request for the following page with the same size and sort.
    ///
    /// # Errors
    /// - `InvalidArgument` when the page index or its offset would overflow.
    pub fn next(&self) -> RepoResult<Self> {
        let page = self.page.checked_add(1).ok_or_else(|| {
            RepoError::InvalidArgument(format!("page {} has no successor", self.page))
        })?;
        Self::of_sorted(page, self.size, self.sort.clone())
    }
}

/// One window of results plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    content: Vec<T>,
    total_elements: i64,
    number: i64,
    size: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: i64, number: i64, size: i64) -> Self {
        Self {
            content,
            total_elements,
            number,
            size,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn total_elements(&self) -> i64 {
        self.total_elements
    }

    /// Zero-based page index.
    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    /// Number of records on this page.
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_pages(&self) -> i64 {
        if self.size <= 0 {
            return 0;
        }
        self.total_elements / self.size + i64::from(self.total_elements % self.size != 0)
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        self.number
            .saturating_add(1)
            .saturating_mul(self.size)
            < self.total_elements
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Converts the content while keeping the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            number: self.number,
            size: self.size,
        }
    }
}

/// Runs `content` windowed to `request` and `count` unwindowed.
pub fn paginate<T>(
    conn: &Connection,
    content: &QueryPlan,
    count: &QueryPlan,
    request: &PageRequest,
    map_row: impl FnMut(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Page<T>> {
    if !conn.is_autocommit() {
        return read_page(conn, content, count, request, map_row);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let page = read_page(&tx, content, count, request, map_row)?;
    tx.commit()?;
    Ok(page)
}

fn read_page<T>(
    conn: &Connection,
    content: &QueryPlan,
    count: &QueryPlan,
    request: &PageRequest,
    map_row: impl FnMut(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Page<T>> {
    let window = content.windowed(request.offset(), request.size());
    let items = query_rows(conn, &window, map_row)?;
    let total = query_count(conn, count)?;
    debug!(
        "event=paginate module=pager status=ok page={} size={} returned={} total={total}",
        request.page(),
        request.size(),
        items.len()
    );
    Ok(Page::new(items, total, request.page(), request.size()))
}

#[cfg(test)]
mod tests {
    use super::{Page, PageRequest};
    use crate::error::RepoError;

    #[test]
    fn first_of_two_pages() {
        let page = Page::new(vec![1, 2, 3], 5, 0, 3);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_first());
        assert!(page.has_next());
        assert!(!page.has_previous());
        assert!(!page.is_last());
    }

    #[test]
    fn last_page_has_no_next() {
        let page = Page::new(vec![4, 5], 5, 1, 3);
        assert!(!page.is_first());
        assert!(!page.has_next());
        assert!(page.is_last());
        assert_eq!(page.number_of_elements(), 2);
    }

    #[test]
    fn exact_multiple_and_empty_totals() {
        assert_eq!(Page::new(vec![0; 3], 6, 0, 3).total_pages(), 2);
        assert_eq!(Page::<i32>::new(Vec::new(), 0, 0, 3).total_pages(), 0);
        assert!(!Page::<i32>::new(Vec::new(), 0, 0, 3).has_next());
    }

    #[test]
    fn maximal_page_size_does_not_overflow() {
        let page = Page::new(vec![1, 2, 3], 3, 0, i64::MAX);
        assert_eq!(page.total_pages(), 1);
        assert!(page.is_last());
        assert!(!page.has_next());

        let far = Page::<i32>::new(Vec::new(), 5, i64::MAX, 1);
        assert!(!far.has_next());
        assert_eq!(far.total_pages(), 5);
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page::new(vec![1, 2], 5, 2, 2).map(|value| value * 10);
        assert_eq!(page.content(), &[10, 20]);
        assert_eq!(page.total_elements(), 5);
        assert_eq!(page.number(), 2);
        assert_eq!(page.size(), 2);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        for (page, size) in [(0, 0), (0, -3), (-1, 3), (i64::MAX, 2)] {
            let err = PageRequest::of(page, size).unwrap_err();
            assert!(matches!(err, RepoError::InvalidArgument(_)), "{page}/{size}");
        }

        let last = PageRequest::of(i64::MAX, 1).unwrap();
        assert!(matches!(last.next(), Err(RepoError::InvalidArgument(_))));
        let last_offset = PageRequest::of(i64::MAX / 2, 2).unwrap();
        assert!(matches!(last_offset.next(), Err(RepoError::InvalidArgument(_))));
    }

    #[test]
    fn offset_and_next_follow_size() {
        let request = PageRequest::of(2, 3).unwrap();
        assert_eq!(request.offset(), 6);
        assert_eq!(request.next().unwrap().offset(), 9);
    }
}
