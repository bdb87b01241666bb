//! Screen data model: cells, colors and the fixed 24x80 grid.

pub mod cell;
pub mod screen;

pub use cell::{Attributes, Cell, Color, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};
pub use screen::{Screen, COLUMNS, ROWS};
