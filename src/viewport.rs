use std::ops::Range;

/// Fixed row height virtualization of the current page.
///
/// Only the rows inside the window are handed to the renderer. The window is
/// derived from the scroll offset and the row height, so its cost does not
/// depend on the number of rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    row_height: usize,
    max_height: usize,
    scroll: usize, // In the same units as row_height
    cursor: usize, // Row on the page
}

impl Viewport {
    pub fn new(row_height: usize, max_height: usize) -> Self {
        Self {
            row_height: std::cmp::max(row_height, 1),
            max_height,
            scroll: 0,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Height of the rendered list for a page with `rows` entries.
    pub fn list_height(&self, rows: usize) -> usize {
        std::cmp::min(rows.saturating_mul(self.row_height), self.max_height)
    }

    /// Number of rows that fit into the list at once, partially shown rows included.
    pub fn capacity(&self, rows: usize) -> usize {
        self.list_height(rows).div_ceil(self.row_height)
    }

    /// Page rows to render.
    pub fn window(&self, rows: usize) -> Range<usize> {
        let first = std::cmp::min(self.scroll / self.row_height, rows);
        let last = std::cmp::min(first + self.capacity(rows), rows);
        first..last
    }

    /// Called on terminal resize with the newly measured list height.
    pub fn set_max_height(&mut self, max_height: usize, rows: usize) {
        self.max_height = max_height;
        self.clamp(rows);
    }

    pub fn reset(&mut self) {
        self.scroll = 0;
        self.cursor = 0;
    }

    pub fn move_down(&mut self, step: usize, rows: usize) {
        if rows == 0 {
            return;
        }
        self.cursor = std::cmp::min(self.cursor.saturating_add(step), rows - 1);
        self.follow_cursor(rows);
    }

    pub fn move_up(&mut self, step: usize, rows: usize) {
        self.cursor = self.cursor.saturating_sub(step);
        self.follow_cursor(rows);
    }

    pub fn move_beginning(&mut self) {
        self.reset();
    }

    pub fn move_end(&mut self, rows: usize) {
        if rows == 0 {
            self.reset();
            return;
        }
        self.cursor = rows - 1;
        self.follow_cursor(rows);
    }

    /// Keeps the cursor and the scroll offset inside a page of `rows` entries.
    pub fn clamp(&mut self, rows: usize) {
        if rows == 0 {
            self.reset();
            return;
        }
        self.cursor = std::cmp::min(self.cursor, rows - 1);
        self.follow_cursor(rows);
    }

    fn follow_cursor(&mut self, rows: usize) {
        // Whole rows that fit, at least one
        let fully_visible = std::cmp::max(self.list_height(rows) / self.row_height, 1);
        let first = self.scroll / self.row_height;
        let first = if self.cursor < first {
            self.cursor
        } else if self.cursor >= first + fully_visible {
            self.cursor + 1 - fully_visible
        } else {
            first
        };
        let max_first = rows.saturating_sub(fully_visible);
        self.scroll = std::cmp::min(first, max_first) * self.row_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_height_is_bounded() {
        let vp = Viewport::new(48, 402);
        assert_eq!(vp.list_height(5), 240);
        assert_eq!(vp.list_height(100), 402);
        assert_eq!(vp.list_height(0), 0);
    }

    #[test]
    fn window_never_exceeds_rows() {
        let vp = Viewport::new(1, 20);
        assert_eq!(vp.window(5), 0..5);
        assert_eq!(vp.window(100), 0..20);
        assert_eq!(vp.window(0), 0..0);
    }

    #[test]
    fn window_counts_partial_rows() {
        let vp = Viewport::new(48, 100);
        assert_eq!(vp.capacity(10), 3);
        assert_eq!(vp.window(10), 0..3);
    }

    #[test]
    fn scrolling_follows_cursor() {
        let mut vp = Viewport::new(1, 10);
        vp.move_down(12, 100);
        assert_eq!(vp.cursor(), 12);
        assert_eq!(vp.window(100), 3..13);
        vp.move_up(5, 100);
        assert_eq!(vp.window(100), 3..13);
        vp.move_up(5, 100);
        assert_eq!(vp.cursor(), 2);
        assert_eq!(vp.window(100), 2..12);
        vp.move_end(100);
        assert_eq!(vp.window(100), 90..100);
        vp.move_beginning();
        assert_eq!(vp.window(100), 0..10);
    }

    #[test]
    fn cursor_stays_on_page() {
        let mut vp = Viewport::new(1, 10);
        vp.move_down(500, 20);
        assert_eq!(vp.cursor(), 19);
        vp.clamp(5);
        assert_eq!(vp.cursor(), 4);
        assert_eq!(vp.window(5), 0..5);
        vp.clamp(0);
        assert_eq!(vp.cursor(), 0);
    }

    #[test]
    fn resize_keeps_cursor_visible() {
        let mut vp = Viewport::new(1, 20);
        vp.move_down(15, 50);
        assert_eq!(vp.window(50), 0..20);
        vp.set_max_height(5, 50);
        let window = vp.window(50);
        assert!(window.contains(&vp.cursor()));
        assert_eq!(window.len(), 5);
    }
}
