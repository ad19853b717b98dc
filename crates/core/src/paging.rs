//! Page arithmetic for the explorer's pagination controls.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
}

/// Navigation request from the pagination controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Previous,
    Next,
    Last,
    To(u32),
}

impl PageWindow {
    /// Always at least 1, even for an empty result.
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 { return 1; }
        let pages = self.total_count.div_ceil(self.page_size as u64);
        pages.clamp(1, u32::MAX as u64) as u32
    }

    pub fn is_first(&self) -> bool { self.page_number <= 1 }

    pub fn is_last(&self) -> bool { self.page_number >= self.total_pages() }

    pub fn has_records(&self) -> bool { self.total_count > 0 }

    /// 1-based index of the first record on this page.
    pub fn start_record(&self) -> u64 {
        (self.page_number.saturating_sub(1) as u64) * self.page_size as u64 + 1
    }

    pub fn end_record(&self) -> u64 {
        (self.page_number as u64 * self.page_size as u64).min(self.total_count)
    }

    pub fn info(&self) -> String {
        if !self.has_records() {
            return "No records to display".to_string();
        }
        format!("{}-{} of {}", self.start_record(), self.end_record(), self.total_count)
    }

    /// Page to load for `nav`, or `None` when the request is a no-op or out of range.
    pub fn target(&self, nav: PageNav) -> Option<u32> {
        let last = self.total_pages();
        match nav {
            PageNav::First => (self.page_number != 1).then_some(1),
            PageNav::Previous => (self.page_number > 1).then(|| self.page_number - 1),
            PageNav::Next => (self.page_number < last).then(|| self.page_number + 1),
            PageNav::Last => (self.page_number != last).then_some(last),
            PageNav::To(n) => (n >= 1 && n <= last && n != self.page_number).then_some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(page_number: u32, page_size: u32, total_count: u64) -> PageWindow {
        PageWindow { page_number, page_size, total_count }
    }

    #[test]
    fn totals_and_bounds() {
        assert_eq!(w(1, 25, 0).total_pages(), 1);
        assert_eq!(w(1, 25, 25).total_pages(), 1);
        assert_eq!(w(1, 25, 26).total_pages(), 2);
        assert_eq!(w(2, 25, 120).info(), "26-50 of 120");
        assert_eq!(w(5, 25, 120).info(), "101-120 of 120");
        assert_eq!(w(1, 25, 0).info(), "No records to display");
    }

    #[test]
    fn navigation_stops_at_edges() {
        let first = w(1, 25, 120);
        assert_eq!(first.target(PageNav::Previous), None);
        assert_eq!(first.target(PageNav::First), None);
        assert_eq!(first.target(PageNav::Next), Some(2));
        assert_eq!(first.target(PageNav::Last), Some(5));

        let last = w(5, 25, 120);
        assert_eq!(last.target(PageNav::Next), None);
        assert_eq!(last.target(PageNav::Last), None);
        assert_eq!(last.target(PageNav::Previous), Some(4));
    }

    #[test]
    fn direct_entry_must_be_in_range() {
        let p = w(2, 50, 120);
        assert_eq!(p.target(PageNav::To(3)), Some(3));
        assert_eq!(p.target(PageNav::To(4)), None);
        assert_eq!(p.target(PageNav::To(0)), None);
        assert_eq!(p.target(PageNav::To(2)), None);
    }
}
