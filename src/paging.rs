//! Pagination for the detail lists.

use serde::Serialize;

pub const PAGE_SIZES: [usize; 5] = [10, 25, 50, 100, 200];
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageState {
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl PageState {
    /// Sizes outside [`PAGE_SIZES`] fall back to the default.
    pub fn with_page_size(page_size: usize) -> Self {
        let mut state = Self::default();
        state.set_page_size(page_size);
        state
    }

    pub fn total_pages(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.page_size).max(1)
    }

    /// Changing the size always returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = if PAGE_SIZES.contains(&page_size) {
            page_size
        } else {
            DEFAULT_PAGE_SIZE
        };
        self.page = 1;
    }

    /// Jump to `page`, clamped to the valid range.
    pub fn jump_to(&mut self, page: usize, total_rows: usize) {
        self.page = page.clamp(1, self.total_pages(total_rows));
    }

    pub fn next(&mut self, total_rows: usize) {
        self.jump_to(self.page + 1, total_rows);
    }

    pub fn prev(&mut self, total_rows: usize) {
        self.jump_to(self.page.saturating_sub(1), total_rows);
    }

    /// Rows of the current page. A page past the end (after the data shrank
    /// under a new filter) yields the last page.
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let page = self.page.clamp(1, self.total_pages(rows.len()));
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(rows.len());
        &rows[start.min(rows.len())..end]
    }

    /// `"Page 2 of 5 | Showing records 51-100 of 230"`.
    pub fn describe(&self, total_rows: usize) -> String {
        let page = self.page.clamp(1, self.total_pages(total_rows));
        let start = if total_rows == 0 { 0 } else { (page - 1) * self.page_size + 1 };
        let end = (page * self.page_size).min(total_rows);
        format!(
            "Page {} of {} | Showing records {}-{} of {}",
            page,
            self.total_pages(total_rows),
            start,
            end,
            total_rows
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_first_page_of_fifty() {
        let p = PageState::default();
        assert_eq!((p.page, p.page_size), (1, 50));
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(50), 1);
        assert_eq!(p.total_pages(51), 2);
    }

    #[test]
    fn unknown_sizes_fall_back_and_reset_page() {
        let mut p = PageState::with_page_size(25);
        p.jump_to(3, 100);
        assert_eq!(p.page, 3);
        p.set_page_size(33);
        assert_eq!((p.page, p.page_size), (1, 50));
    }

    #[test]
    fn jumps_clamp_and_slices_follow() {
        let rows: Vec<u32> = (1..=23).collect();
        let mut p = PageState::with_page_size(10);
        p.jump_to(99, rows.len());
        assert_eq!(p.page, 3);
        assert_eq!(p.slice(&rows), &[21, 22, 23]);
        p.prev(rows.len());
        assert_eq!(p.slice(&rows)[0], 11);
        p.jump_to(0, rows.len());
        assert_eq!(p.page, 1);
        assert_eq!(p.describe(rows.len()), "Page 1 of 3 | Showing records 1-10 of 23");
    }

    #[test]
    fn stale_page_on_shrunk_data_shows_last_page() {
        let mut p = PageState::with_page_size(10);
        p.jump_to(5, 100);
        let rows: Vec<u32> = (1..=12).collect();
        assert_eq!(p.slice(&rows), &[11, 12]);
        assert!(p.slice(&Vec::<u32>::new()).is_empty());
        assert_eq!(p.describe(0), "Page 1 of 1 | Showing records 0-0 of 0");
    }
}
