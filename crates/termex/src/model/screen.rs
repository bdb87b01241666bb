//! Fixed-size screen grid and its mutation operations.

use crate::model::cell::Cell;

/// Number of screen rows.
pub const ROWS: usize = 24;
/// Number of screen columns.
pub const COLUMNS: usize = 80;

// Column bound in cursor coordinates; the grid is small, the cast cannot
// truncate.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const COLUMN_END: i32 = COLUMNS as i32;

/// Resolve a possibly-negative coordinate against a row/column count.
///
/// Negative values index from the end, matching what programs that backspace
/// past column 0 historically relied on. `None` means the position falls
/// outside the grid entirely.
pub(crate) fn resolve_index(index: i32, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = usize::try_from(index).ok()?;
        (index < len).then_some(index)
    } else {
        let back = usize::try_from(index.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

/// The 24x80 grid of cells. Row 0 is the top. Never resized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Screen {
    rows: Vec<Vec<Cell>>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::blank()
    }
}

impl Screen {
    /// A screen of all-blank cells.
    pub fn blank() -> Self {
        Self {
            rows: (0..ROWS)
                .map(|_| (0..COLUMNS).map(|_| Cell::default()).collect())
                .collect(),
        }
    }

    /// Reset every cell to blank.
    pub fn erase_all(&mut self) {
        *self = Self::blank();
    }

    /// Read one cell. `None` when the resolved position is off the grid.
    pub fn cell(&self, row: i32, col: i32) -> Option<&Cell> {
        let row = resolve_index(row, ROWS)?;
        let col = resolve_index(col, COLUMNS)?;
        self.rows.get(row)?.get(col)
    }

    /// Write one cell. Off-grid writes are dropped with a diagnostic; the
    /// cursor arithmetic that produces them is deliberately unchecked.
    pub fn put(&mut self, row: i32, col: i32, cell: Cell) {
        let Some((row_index, col_index)) =
            resolve_index(row, ROWS).zip(resolve_index(col, COLUMNS))
        else {
            tracing::trace!(row, col, "dropping write outside the screen grid");
            return;
        };
        if let Some(slot) = self
            .rows
            .get_mut(row_index)
            .and_then(|line| line.get_mut(col_index))
        {
            *slot = cell;
        }
    }

    /// Drop row 0 and append a blank row at the bottom.
    pub fn scroll_up(&mut self) {
        self.rows.remove(0);
        self.rows.push((0..COLUMNS).map(|_| Cell::default()).collect());
    }

    /// Overwrite cells from `col` to the end of `row` with blanks.
    ///
    /// `col` is the unclamped cursor column: every index from `col` up to the
    /// row end is resolved individually, so a negative start also wraps and
    /// blanks the cells it indexes from the end. Erasing from column -1
    /// therefore blanks the entire row.
    pub fn erase_line_from(&mut self, row: i32, col: i32) {
        let Some(row_index) = resolve_index(row, ROWS) else {
            tracing::trace!(row, "dropping line erase outside the screen grid");
            return;
        };
        let Some(line) = self.rows.get_mut(row_index) else {
            return;
        };
        for raw in col.max(-COLUMN_END)..COLUMN_END {
            if let Some(slot) =
                resolve_index(raw, COLUMNS).and_then(|index| line.get_mut(index))
            {
                *slot = Cell::default();
            }
        }
    }

    /// Remove the last `count` cells of `row`, then reinsert `count` blanks at
    /// `col`, shifting trailing content right. Row length stays at COLUMNS.
    pub fn insert_blanks(&mut self, row: i32, col: i32, count: usize) {
        let Some(row_index) = resolve_index(row, ROWS) else {
            tracing::trace!(row, "dropping insert-blanks outside the screen grid");
            return;
        };
        let count = count.min(COLUMNS);
        let Some(line) = self.rows.get_mut(row_index) else {
            return;
        };
        line.truncate(COLUMNS - count);
        // The insertion point behaves like a slice bound on the shortened
        // row: negative columns resolve from its new end, out-of-range
        // positions clamp to the nearest edge.
        let at = match resolve_index(col, line.len()) {
            Some(at) => at,
            None if col < 0 => 0,
            None => line.len(),
        };
        for _ in 0..count {
            line.insert(at, Cell::default());
        }
    }

    /// Iterate rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Visual equality: characters and resolved colors.
    ///
    /// Reverse video with swapped colors renders the same as normal video,
    /// so two cells that differ only in that representation still match.
    pub fn matches_rendered(&self, other: &Self) -> bool {
        self.rows.iter().zip(&other.rows).all(|(mine, theirs)| {
            mine.iter().zip(theirs).all(|(a, b)| {
                a.ch == b.ch
                    && a.resolved_fg() == b.resolved_fg()
                    && a.resolved_bg() == b.resolved_bg()
            })
        })
    }
}
