//! Page-number window for the grid footer.
//!
//! The window is the current page with one neighbour on each side, grown by
//! one more page forward, or backward when the current page is one of the
//! last two. Page 1 and the last page are always present; any gap between
//! them and the window collapses into an ellipsis.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "page")]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagePlan {
    pub current: u32,
    pub total: u32,
    pub items: Vec<PageItem>,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PagePlan {
    /// Target of the "previous" control, clamped to `[1, total]`.
    pub fn prev_page(&self) -> u32 {
        self.current.saturating_sub(1).clamp(1, self.total.max(1))
    }

    /// Target of the "next" control, clamped to `[1, total]`.
    pub fn next_page(&self) -> u32 {
        self.current.saturating_add(1).clamp(1, self.total.max(1))
    }

    pub fn pages(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PageItem::Page(n) => Some(*n),
                PageItem::Ellipsis => None,
            })
            .collect()
    }
}

/// Plan the footer for `current` out of `total` pages.
pub fn plan(current: u32, total: u32) -> PagePlan {
    if total == 0 {
        return PagePlan {
            current: current.max(1),
            total,
            items: Vec::new(),
            has_prev: current > 1,
            has_next: false,
        };
    }

    let current = current.clamp(1, total);
    let mut window_start = current.saturating_sub(1).max(1);
    let mut window_end = current.saturating_add(1).min(total);

    // One extra page, forward first.
    if current.saturating_add(1) < total {
        window_end += 1;
    } else if window_start > 1 {
        window_start -= 1;
    }

    let mut items = Vec::with_capacity(8);
    if window_start > 1 {
        items.push(PageItem::Page(1));
        if window_start > 2 {
            items.push(PageItem::Ellipsis);
        }
    }
    items.extend((window_start..=window_end).map(PageItem::Page));
    if window_end < total {
        if window_end + 1 < total {
            items.push(PageItem::Ellipsis);
        }
        items.push(PageItem::Page(total));
    }

    PagePlan {
        current,
        total,
        items,
        has_prev: current > 1,
        has_next: current < total,
    }
}
