//! Page-based pagination shared by every list endpoint

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Highest page whose offset still fits a Postgres BIGINT
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

/// A requested page (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Clamp the page to 1..=MAX_PAGE and the limit to 1..=MAX_PAGE_SIZE
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A page of results plus the numbers a client needs to navigate
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let pages = total.div_ceil(request.limit);
        Self {
            items,
            page: request.page,
            limit: request.limit,
            total,
            pages,
            has_next: request.page < pages,
            has_prev: request.page > 1,
        }
    }

    /// Paginate an already filtered, in-memory collection
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .collect();
        Self::new(items, request, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            pages: self.pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_clamps_values() {
        let request = PageRequest::new(Some(0), Some(1000));
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, MAX_PAGE_SIZE);

        let request = PageRequest::new(None, Some(0));
        assert_eq!(request.limit, 1);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn huge_page_stays_within_bigint() {
        let request = PageRequest::new(Some(u64::MAX), Some(MAX_PAGE_SIZE));
        assert_eq!(request.page, MAX_PAGE);
        assert!(request.offset() <= i64::MAX as u64);

        let page = Page::from_vec(vec![1, 2, 3], PageRequest::new(Some(u64::MAX), Some(20)));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert!(!page.has_next);
    }

    #[test]
    fn page_navigation_flags() {
        let page = Page::new(vec![1, 2], PageRequest::new(Some(2), Some(2)), 5);
        assert_eq!(page.pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last = Page::new(vec![5], PageRequest::new(Some(3), Some(2)), 5);
        assert!(!last.has_next);
    }

    #[test]
    fn empty_page() {
        let page: Page<u8> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(page.pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn from_vec_slices() {
        let page = Page::from_vec((1..=7).collect(), PageRequest::new(Some(2), Some(3)));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
    }
}
