use derive_setters::Setters;

use crate::dataset::ResultSet;

/// Units used to turn text lengths into column widths.
#[derive(Debug, Clone, Copy, PartialEq, Setters)]
#[setters(prefix = "with_")]
pub struct ColumnMetrics {
    pub char_width: usize,
    pub padding: usize,
    pub min_width: usize,
    pub max_width: usize,
    pub min_content_chars: usize,
}

impl ColumnMetrics {
    /// Terminal cells.
    pub fn cells() -> Self {
        Self {
            char_width: 1,
            padding: 2,
            min_width: 8,
            max_width: 40,
            min_content_chars: 3,
        }
    }
}

/// Widest text of a column over the given rows, in characters.
fn max_text_len(result: &ResultSet, rows: &[usize], column: usize) -> usize {
    rows.iter()
        .filter_map(|&r| result.rows().get(r))
        .map(|row| {
            row.get(column)
                .map(|v| v.cell_text().chars().count())
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// Width needed to show the header and every cell of a column, unclamped.
pub fn content_width(
    result: &ResultSet,
    rows: &[usize],
    column: usize,
    metrics: &ColumnMetrics,
) -> usize {
    let header_len = result
        .columns()
        .get(column)
        .map(|h| h.chars().count())
        .unwrap_or(0);
    let content_len = std::cmp::max(metrics.min_content_chars, max_text_len(result, rows, column));
    std::cmp::max(header_len, content_len) * metrics.char_width + metrics.padding
}

/// Content width clamped into the metrics' bounds.
pub fn column_width(
    result: &ResultSet,
    rows: &[usize],
    column: usize,
    metrics: &ColumnMetrics,
) -> usize {
    content_width(result, rows, column, metrics).clamp(metrics.min_width, metrics.max_width)
}

/// Spreads the space left in `container` evenly across `widths`. The last
/// column receives the rounding remainder so the sum equals the container.
pub fn spread_surplus(widths: &mut [usize], container: usize) {
    let total: usize = widths.iter().sum();
    if widths.is_empty() || container == 0 || total >= container {
        return;
    }
    let surplus = container - total;
    let extra = surplus / widths.len();
    for w in widths.iter_mut() {
        *w += extra;
    }
    let count = widths.len();
    if let Some(last) = widths.last_mut() {
        *last += surplus - extra * count;
    }
}

/// Widths used for drawing: clamped per column, then widened to fill the
/// container when the table is narrower than it. The container also holds one
/// spacer cell between neighbouring columns.
pub fn render_widths(
    result: &ResultSet,
    rows: &[usize],
    container: usize,
    metrics: &ColumnMetrics,
) -> Vec<usize> {
    let mut widths: Vec<usize> = (0..result.columns().len())
        .map(|c| column_width(result, rows, c, metrics))
        .collect();
    let spacers = widths.len().saturating_sub(1);
    spread_surplus(&mut widths, container.saturating_sub(spacers));
    widths
}

/// Columns drawn when starting at `offset`, each with its drawn width. A column
/// that does not fit completely is cut to the remaining space.
pub fn visible_columns(widths: &[usize], offset: usize, available: usize) -> Vec<(usize, usize)> {
    let mut visible = Vec::new();
    let mut used = 0;
    for (idx, &width) in widths.iter().enumerate().skip(offset) {
        // One spacer cell between columns
        let spacer = if visible.is_empty() { 0 } else { 1 };
        if used + spacer + width <= available {
            visible.push((idx, width));
            used += spacer + width;
        } else {
            if used + spacer < available {
                visible.push((idx, available - used - spacer));
            }
            break;
        }
    }
    visible
}
