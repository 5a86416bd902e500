//! Offset pagination over post listings.

use serde::Serialize;

use crate::db::ConnectionMethods;
use crate::models::Post;
use crate::query::PostFilter;
use crate::Result;

/// Number of posts shown per page unless configured otherwise.
pub const DEFAULT_PER_PAGE: u32 = 5;

/// A 1-based page number and a page size, both at least 1.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}
impl PageRequest {
    /// Request `page` of `per_page` items. Zero is treated as 1.
    pub fn new(page: u32, per_page: u32) -> Self {
        PageRequest {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }
    /// The requested page number.
    pub fn page(&self) -> u32 {
        self.page
    }
    /// The page size.
    pub fn per_page(&self) -> u32 {
        self.per_page
    }
    /// Number of items preceding this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
    /// Maximum number of items on this page.
    pub fn limit(&self) -> u32 {
        self.per_page
    }
}
impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(1, DEFAULT_PER_PAGE)
    }
}

/// How many page numbers [`Page::iter_pages`] shows around each landmark.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageWindow {
    /// Pages shown at the start.
    pub left_edge: u32,
    /// Pages shown before the current one.
    pub left_current: u32,
    /// Pages shown after the current one.
    pub right_current: u32,
    /// Pages shown at the end.
    pub right_edge: u32,
}
impl Default for PageWindow {
    fn default() -> Self {
        PageWindow {
            left_edge: 2,
            left_current: 2,
            right_current: 4,
            right_edge: 2,
        }
    }
}

/// One page of results together with the totals needed to navigate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page. Empty when the page is past the end.
    pub items: Vec<T>,
    /// The 1-based page number.
    pub page: u32,
    /// The page size.
    pub per_page: u32,
    /// Number of items across all pages.
    pub total: u64,
}
impl<T> Page<T> {
    /// Total number of pages; zero when there are no items.
    pub fn pages(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.per_page.max(1)));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
    /// Whether a previous page exists.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
    /// Whether a next page exists.
    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }
    /// Number of the previous page.
    pub fn prev_num(&self) -> Option<u32> {
        self.has_prev().then(|| self.page - 1)
    }
    /// Number of the next page.
    pub fn next_num(&self) -> Option<u32> {
        self.has_next().then(|| self.page.saturating_add(1))
    }
    /// Transform the items, keeping the totals.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }

    /// Page numbers to offer for navigation: the first and last few pages
    /// and a run around the current one. `None` marks a gap.
    pub fn iter_pages(&self, window: PageWindow) -> Vec<Option<u32>> {
        let mut out = Vec::new();
        let pages_end = self.pages().saturating_add(1);
        if pages_end == 1 {
            return out;
        }
        let left_end = window.left_edge.saturating_add(1).min(pages_end);
        out.extend((1..left_end).map(Some));
        // Exclusive end of the numbers emitted so far.
        let mut shown = left_end;
        let mid_start = left_end.max(self.page.saturating_sub(window.left_current));
        let mid_end = self
            .page
            .saturating_add(window.right_current)
            .saturating_add(1)
            .min(pages_end);
        // Empty when the current page is past the end.
        if mid_start < mid_end {
            if mid_start > shown {
                out.push(None);
            }
            out.extend((mid_start..mid_end).map(Some));
            shown = mid_end;
        }
        if shown == pages_end {
            return out;
        }
        let right_start = shown.max(pages_end.saturating_sub(window.right_edge));
        if right_start > shown {
            out.push(None);
        }
        out.extend((right_start..pages_end).map(Some));
        out
    }
}

/// Count the posts matching `filter` and fetch the requested page of them.
/// A page past the end comes back with no items.
pub fn paginate<C>(conn: &C, filter: &PostFilter, request: PageRequest) -> Result<Page<Post>>
where
    C: ConnectionMethods + ?Sized,
{
    let total = conn.count_posts(filter)?;
    let items = if request.offset() >= total {
        Vec::new()
    } else {
        conn.query_posts(filter, Some(request.limit()), Some(request.offset()))?
    };
    Ok(Page {
        items,
        page: request.page(),
        per_page: request.per_page(),
        total,
    })
}
