//! Page-based pagination for list endpoints.

use serde::{Deserialize, Serialize};

/// Query parameters accepted by paginated endpoints.
///
/// Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "PageRequest::default_page")]
    pub page: u32,
    #[serde(default = "PageRequest::default_per_page")]
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: Self::default_page(),
            per_page: Self::default_per_page(),
        }
    }
}

impl PageRequest {
    pub const MAX_PER_PAGE: u32 = 100;

    const fn default_page() -> u32 {
        1
    }

    const fn default_per_page() -> u32 {
        20
    }

    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }.clamped()
    }

    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.clamped().per_page)
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        let p = self.clamped();
        i64::from(p.page - 1) * i64::from(p.per_page)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let request = request.clamped();
        let per_page = i64::from(request.per_page);
        let total = total.max(0);
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            total_pages: (total + per_page - 1) / per_page,
        }
    }

    /// Transform each item, keeping page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        let p = PageRequest::new(0, 500);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 100);
        assert_eq!(PageRequest::new(3, 0).per_page, 1);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
        assert_eq!(PageRequest { page: 0, per_page: 0 }.offset(), 0);
    }

    #[test]
    fn test_total_pages() {
        let page: Paginated<u8> = Paginated::new(vec![], PageRequest::new(1, 20), 41);
        assert_eq!(page.total_pages, 3);
        let empty: Paginated<u8> = Paginated::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }
}
