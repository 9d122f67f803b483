//! Fixed-size pagination with clamped page numbers.

use serde::Serialize;

/// One page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number after clamping.
    pub page: usize,
    pub page_count: usize,
    pub page_size: usize,
    /// Items across all pages.
    pub total: usize,
    /// Index of the first item of the page in the full list.
    pub start_index: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Splits item lists into pages of `page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
}

impl Paginator {
    /// Create a paginator. A zero size is treated as one.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pages needed for `total` items.
    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    /// Clamp a requested page into `[1, page_count]`; page 1 when there are
    /// no pages.
    pub fn clamp(&self, page: usize, total: usize) -> usize {
        page.clamp(1, self.page_count(total).max(1))
    }

    /// The requested page of `items`.
    pub fn paginate<T: Clone>(&self, items: &[T], page: usize) -> Page<T> {
        let total = items.len();
        let page = self.clamp(page, total);
        let start_index = (page - 1) * self.page_size;
        let end = (start_index + self.page_size).min(total);
        let items = items.get(start_index..end).map(<[T]>::to_vec).unwrap_or_default();

        Page {
            items,
            page,
            page_count: self.page_count(total),
            page_size: self.page_size,
            total,
            start_index,
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(10)
    }
}
