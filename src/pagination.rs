//! Pagination
//!
//! Builds the bounded page list shown under paged tables: first page, last
//! page and the pages around the current one, with ellipses over the gaps.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

/// Totals up to this many pages are listed in full
pub const FULL_LIST_THRESHOLD: u32 = 7;

// =============================================================================
// Page Model
// =============================================================================

/// One slot of the page list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageItem {
    /// Link to a page (1-based)
    Page(u32),
    /// Gap marker
    Ellipsis,
}

impl PageItem {
    /// Page number, if this slot is a page
    pub fn page(&self) -> Option<u32> {
        match self {
            PageItem::Page(n) => Some(*n),
            PageItem::Ellipsis => None,
        }
    }
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageItem::Page(n) => write!(f, "{}", n),
            PageItem::Ellipsis => write!(f, "…"),
        }
    }
}

/// Build the page list for `current_page` of `total_pages`
///
/// `current_page` is clamped into `[1, total_pages]`. No pages yields an
/// empty list.
pub fn page_model(current_page: u32, total_pages: u32) -> Vec<PageItem> {
    if total_pages == 0 {
        return Vec::new();
    }
    if total_pages <= FULL_LIST_THRESHOLD {
        return (1..=total_pages).map(PageItem::Page).collect();
    }

    let current = current_page.clamp(1, total_pages);
    let pages: BTreeSet<u32> = [
        1,
        total_pages,
        current.saturating_sub(1),
        current,
        current.saturating_add(1),
    ]
    .into_iter()
    .filter(|p| (1..=total_pages).contains(p))
    .collect();

    let mut model = Vec::with_capacity(pages.len() * 2);
    let mut previous: Option<u32> = None;
    for page in pages {
        if matches!(previous, Some(prev) if page - prev > 1) {
            model.push(PageItem::Ellipsis);
        }
        model.push(PageItem::Page(page));
        previous = Some(page);
    }
    model
}

// =============================================================================
// Page Window
// =============================================================================

/// Slice of a result set shown on one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    /// Current page (1-based, clamped)
    pub page: u32,
    /// Items per page
    pub page_size: u32,
    /// Total items across all pages
    pub total_items: u64,
}

impl PageWindow {
    /// Window for `page` with `page_size` items per page out of `total_items`
    ///
    /// A zero page size is treated as one item per page.
    pub fn new(page: u32, page_size: u32, total_items: u64) -> Self {
        let page_size = page_size.max(1);
        let mut window = Self {
            page: 1,
            page_size,
            total_items,
        };
        window.page = page.clamp(1, window.total_pages().max(1));
        window
    }

    /// Number of pages needed for all items
    pub fn total_pages(&self) -> u32 {
        let pages = self.total_items.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Index of the first item on this page, for `offset` query parameters
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Items per page, for `limit` query parameters
    pub fn limit(&self) -> u32 {
        self.page_size
    }

    /// 1-based item range on this page, `None` when there are no items
    pub fn shown(&self) -> Option<RangeInclusive<u64>> {
        if self.total_items == 0 {
            return None;
        }
        let first = self.offset() + 1;
        let last = (self.offset() + u64::from(self.page_size)).min(self.total_items);
        Some(first..=last)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Page list for this window
    pub fn model(&self) -> Vec<PageItem> {
        page_model(self.page, self.total_pages())
    }
}
