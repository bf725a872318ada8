use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::trace;

use crate::dataset::{ResultSet, Row};

pub const PAGE_SIZE_OPTIONS: [usize; 5] = [5, 10, 20, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Indices of the rows in `result` that contain `term` in any of their values,
/// ignoring case. An empty term keeps every row.
pub fn filter_rows(result: &ResultSet, term: &str) -> Vec<usize> {
    if term.is_empty() {
        return (0..result.len()).collect();
    }
    let needle = term.to_lowercase();
    result
        .rows()
        .par_iter()
        .enumerate()
        .filter(|(_, row)| row_matches(row, &needle))
        .map(|(idx, _)| idx)
        .collect()
}

fn row_matches(row: &Row, needle: &str) -> bool {
    row.values
        .iter()
        .any(|v| v.to_string().to_lowercase().contains(needle))
}

/// Range of view positions shown on `page`, empty when the page is out of range.
pub fn paginate(len: usize, page_size: usize, page: usize) -> Range<usize> {
    let start = page.saturating_mul(page_size);
    if start >= len {
        return 0..0;
    }
    start..std::cmp::min(start + page_size, len)
}

pub fn page_slice<T>(view: &[T], page_size: usize, page: usize) -> &[T] {
    &view[paginate(view.len(), page_size, page)]
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageState {
    pub page_size: usize,
    pub page: usize,
}

/// A result set together with its filter and pagination state.
pub struct TableState {
    result: ResultSet,
    filter: String,
    rows: Arc<Vec<usize>>, // Indices into result for the filtered view
    paging: PageState,
}

impl TableState {
    pub fn new(result: ResultSet, page_size: usize) -> Self {
        let rows = Arc::new((0..result.len()).collect());
        Self {
            result,
            filter: String::new(),
            rows,
            paging: PageState {
                page_size: normalize_page_size(page_size),
                page: 0,
            },
        }
    }

    pub fn result(&self) -> &ResultSet {
        &self.result
    }

    pub fn filter_text(&self) -> &str {
        &self.filter
    }

    pub fn filtered_rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn filtered_len(&self) -> usize {
        self.rows.len()
    }

    pub fn paging(&self) -> PageState {
        self.paging
    }

    pub fn page_count(&self) -> usize {
        page_count(self.rows.len(), self.paging.page_size)
    }

    /// Result indices of the rows on the current page.
    pub fn page_rows(&self) -> &[usize] {
        page_slice(&self.rows, self.paging.page_size, self.paging.page)
    }

    pub fn page_range(&self) -> Range<usize> {
        paginate(self.rows.len(), self.paging.page_size, self.paging.page)
    }

    pub fn set_filter(&mut self, term: &str) {
        self.filter = term.to_string();
        self.rows = Arc::new(filter_rows(&self.result, term));
        self.paging.page = 0;
        trace!(
            "Filter \"{}\" keeps {}/{} rows",
            term,
            self.rows.len(),
            self.result.len()
        );
    }

    pub fn clear_filter(&mut self) {
        self.set_filter("");
    }

    /// Changes the page size, keeping the current page when it still exists.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.paging.page_size = normalize_page_size(page_size);
        let pages = self.page_count();
        if pages == 0 {
            self.paging.page = 0;
        } else if self.paging.page >= pages {
            self.paging.page = pages - 1;
        }
    }

    /// Moves to the neighbouring page size option.
    pub fn cycle_page_size(&mut self, grow: bool) {
        let current = PAGE_SIZE_OPTIONS
            .iter()
            .position(|&s| s == self.paging.page_size)
            .unwrap_or(1);
        let next = if grow {
            std::cmp::min(current + 1, PAGE_SIZE_OPTIONS.len() - 1)
        } else {
            current.saturating_sub(1)
        };
        self.set_page_size(PAGE_SIZE_OPTIONS[next]);
    }

    pub fn next_page(&mut self) -> bool {
        if self.paging.page + 1 < self.page_count() {
            self.paging.page += 1;
            return true;
        }
        false
    }

    pub fn prev_page(&mut self) -> bool {
        if self.paging.page > 0 {
            self.paging.page -= 1;
            return true;
        }
        false
    }

    pub fn page_info(&self) -> String {
        let total = self.rows.len();
        if total == 0 {
            return "Showing 0 entries".to_string();
        }
        let range = self.page_range();
        format!(
            "Showing {} to {} of {} entries",
            range.start + 1,
            range.end,
            total
        )
    }
}

fn normalize_page_size(page_size: usize) -> usize {
    if PAGE_SIZE_OPTIONS.contains(&page_size) {
        page_size
    } else {
        // Closest option that is not larger, at least the smallest option
        PAGE_SIZE_OPTIONS
            .iter()
            .copied()
            .filter(|&s| s <= page_size)
            .max()
            .unwrap_or(PAGE_SIZE_OPTIONS[0])
    }
}
