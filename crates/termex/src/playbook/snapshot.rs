//! Screen snapshot serialization.
//!
//! A snapshot is the `<expect>` fragment of a playbook: the screen text as
//! `<line>` elements, per-row `<attr>` key strings for any row with
//! non-default styling, and a `<scheme>` legend mapping each single-character
//! key to its `(attributes, foreground, background)` triple. The same
//! serialization is used when recording and when rendering failure reports,
//! so the two are directly comparable.

use crate::error::{HarnessError, HarnessResult};
use crate::model::cell::{Attributes, Cell, Color};
use crate::model::screen::{Screen, COLUMNS};
use quick_xml::escape::escape;

/// A styling triple as stored in a cell, pre-translation.
pub type StyleTriple = (Attributes, Color, Color);

const DEFAULT_TRIPLE: StyleTriple = (Attributes::Normal, Color::Default, Color::Default);

/// Keys run `'a'..='y'`; a snapshot needing more distinct triples than that
/// cannot be represented in the single-character key space.
pub const MAX_COLOR_KEYS: usize = 25;

/// First-seen-order allocator for single-character color keys.
#[derive(Debug, Default)]
pub(crate) struct ColorKeyTable {
    entries: Vec<StyleTriple>,
}

impl ColorKeyTable {
    fn key_char(index: usize) -> Option<char> {
        u8::try_from(index)
            .ok()
            .filter(|index| usize::from(*index) < MAX_COLOR_KEYS)
            .map(|index| char::from(b'a' + index))
    }

    /// Key for a non-default triple, allocating on first sight.
    pub(crate) fn key_for(&mut self, triple: StyleTriple) -> HarnessResult<char> {
        if let Some(position) = self.entries.iter().position(|entry| *entry == triple) {
            if let Some(key) = Self::key_char(position) {
                return Ok(key);
            }
        } else if let Some(key) = Self::key_char(self.entries.len()) {
            self.entries.push(triple);
            return Ok(key);
        }
        // Hard ceiling baked into the one-letter key space.
        Err(HarnessError::internal(
            "screen snapshot needs more than 25 distinct color combinations",
            serde_json::json!({ "max_color_keys": MAX_COLOR_KEYS }),
        ))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in allocation (= key) order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (char, StyleTriple)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, triple)| Self::key_char(index).map(|key| (key, *triple)))
    }
}

fn cell_triple(cell: &Cell) -> StyleTriple {
    (cell.attr, cell.fg, cell.bg)
}

/// Serialize a screen as a standalone `<expect>` fragment (for failure
/// reports).
pub fn snapshot_xml(screen: &Screen) -> HarnessResult<String> {
    let mut out = String::new();
    write_expect(screen, 0, &mut out)?;
    Ok(out)
}

/// Append the `<expect>` fragment for `screen` at the given indent depth.
pub(crate) fn write_expect(screen: &Screen, level: usize, out: &mut String) -> HarnessResult<()> {
    let indent = "\t".repeat(level);
    let mut table = ColorKeyTable::default();

    out.push_str(&format!("{indent}<expect>\n"));
    out.push_str(&format!("{indent}\t<data>\n"));

    for row in screen.rows() {
        let mut line = String::with_capacity(COLUMNS);
        let mut attr = String::with_capacity(COLUMNS);
        for cell in row {
            line.push(cell.ch);
            let triple = cell_triple(cell);
            if triple == DEFAULT_TRIPLE {
                attr.push(' ');
            } else {
                attr.push(table.key_for(triple)?);
            }
        }
        out.push_str(&format!("{indent}\t\t<line>{}</line>\n", escape(&line)));
        if attr.chars().any(|key| key != ' ') {
            out.push_str(&format!("{indent}\t\t<attr>{}</attr>\n", escape(&attr)));
        }
    }

    out.push_str(&format!("{indent}\t</data>\n"));

    if !table.is_empty() {
        out.push_str(&format!("{indent}\t<scheme>\n"));
        for (key, (attributes, fg, bg)) in table.entries() {
            out.push_str(&format!("{indent}\t\t<color key=\"{key}\""));
            let attr_str = attributes.as_scheme_str();
            if !attr_str.is_empty() {
                out.push_str(&format!(" attributes=\"{attr_str}\""));
            }
            out.push_str(&format!(
                " foreground=\"{}\" background=\"{}\" />\n",
                fg.name(),
                bg.name()
            ));
        }
        out.push_str(&format!("{indent}\t</scheme>\n"));
    }

    out.push_str(&format!("{indent}</expect>\n"));
    Ok(())
}
