//! Playbook files.
//!
//! A playbook is an XML document with a `<test>` root holding an ordered
//! sequence of `<action key="..."/>` keystrokes and `<expect>` screen
//! snapshots. Recording writes one; test mode replays one. See
//! [`snapshot`] for the `<expect>` fragment layout.

pub mod snapshot;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{HarnessError, HarnessResult};
use crate::keys;
use crate::model::cell::{Attributes, Cell, Color};
use crate::model::screen::{Screen, COLUMNS, ROWS};

pub use snapshot::{snapshot_xml, MAX_COLOR_KEYS};

use snapshot::StyleTriple;

/// A screen state the child program is expected to reach.
#[derive(Clone, Debug, PartialEq)]
pub struct Expectation {
    /// Full 24x80 screen snapshot decoded from the playbook.
    pub screen: Screen,
}

/// One step of a playbook, in document order.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybookNode {
    /// Send the named key to the child.
    Action {
        /// Abstract key name, resolved through [`keys::encode_key`].
        key: String,
    },
    /// Wait until the screen matches the snapshot.
    Expect(Expectation),
}

/// An ordered keystroke/expectation script.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Playbook {
    nodes: Vec<PlaybookNode>,
}

impl Playbook {
    pub fn new(nodes: Vec<PlaybookNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[PlaybookNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Read and parse a playbook file.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            HarnessError::io(format!("cannot read playbook '{}'", path.display()), &err)
        })?;
        Self::from_xml(&text)
    }

    /// Serialize and write the playbook to a file.
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let text = self.to_xml()?;
        fs::write(path, text).map_err(|err| {
            HarnessError::io(format!("cannot write playbook '{}'", path.display()), &err)
        })
    }

    /// Serialize to the tab-indented XML document format.
    pub fn to_xml(&self) -> HarnessResult<String> {
        let mut out = String::from("<?xml version='1.0' encoding='utf-8'?>\n<test>\n");
        for node in &self.nodes {
            match node {
                PlaybookNode::Action { key } => {
                    out.push_str(&format!(
                        "\t<action key=\"{}\" />\n",
                        quick_xml::escape::escape(key)
                    ));
                }
                PlaybookNode::Expect(expectation) => {
                    snapshot::write_expect(&expectation.screen, 1, &mut out)?;
                }
            }
        }
        out.push_str("</test>\n");
        Ok(out)
    }

    /// Parse a playbook document.
    pub fn from_xml(text: &str) -> HarnessResult<Self> {
        let mut reader = Reader::from_str(text);
        let mut parser = PlaybookParser {
            reader: &mut reader,
        };
        parser.parse_document()
    }
}

struct PlaybookParser<'r, 's> {
    reader: &'r mut Reader<&'s [u8]>,
}

impl<'s> PlaybookParser<'_, 's> {
    fn next_event(&mut self) -> HarnessResult<Event<'s>> {
        self.reader.read_event().map_err(|err| {
            HarnessError::playbook(
                format!("malformed playbook XML: {err}"),
                serde_json::json!({ "position": self.reader.buffer_position() }),
            )
        })
    }

    fn parse_document(&mut self) -> HarnessResult<Playbook> {
        // Skip the declaration and leading whitespace up to the root.
        let root = loop {
            match self.next_event()? {
                Event::Decl(_) | Event::Comment(_) => {}
                Event::Text(text) if is_blank(&text) => {}
                Event::Start(start) => break start.name().as_ref().to_vec(),
                Event::Eof => {
                    return Err(HarnessError::playbook("playbook document is empty", None));
                }
                other => return Err(unexpected_event(&other)),
            }
        };
        if root != b"test" {
            return Err(HarnessError::playbook(
                format!(
                    "root element '{}' is invalid, expected 'test'",
                    String::from_utf8_lossy(&root)
                ),
                None,
            ));
        }

        let mut nodes = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(start) if start.name().as_ref() == b"action" => {
                    let key = action_key(&start)?;
                    self.skip_to_end(b"action")?;
                    nodes.push(PlaybookNode::Action { key });
                }
                Event::Empty(start) if start.name().as_ref() == b"action" => {
                    let key = action_key(&start)?;
                    nodes.push(PlaybookNode::Action { key });
                }
                Event::Start(start) if start.name().as_ref() == b"expect" => {
                    nodes.push(PlaybookNode::Expect(self.parse_expectation()?));
                }
                Event::Start(start) | Event::Empty(start) => {
                    return Err(unexpected_element(&start, "'action' or 'expect'"));
                }
                Event::Text(text) if is_blank(&text) => {}
                Event::Comment(_) => {}
                Event::End(end) if end.name().as_ref() == b"test" => break,
                Event::Eof => return Err(truncated()),
                other => return Err(unexpected_event(&other)),
            }
        }
        Ok(Playbook::new(nodes))
    }

    fn parse_expectation(&mut self) -> HarnessResult<Expectation> {
        let mut lines: Option<Vec<(String, Option<String>)>> = None;
        let mut scheme: Option<HashMap<char, StyleTriple>> = None;
        loop {
            match self.next_event()? {
                Event::Start(start) if start.name().as_ref() == b"data" => {
                    if lines.is_some() {
                        return Err(HarnessError::playbook(
                            "element 'expect' has more than one 'data' sub-element",
                            None,
                        ));
                    }
                    lines = Some(self.parse_data()?);
                }
                Event::Start(start) if start.name().as_ref() == b"scheme" => {
                    if scheme.is_some() {
                        return Err(HarnessError::playbook(
                            "element 'expect' has more than one 'scheme' sub-element",
                            None,
                        ));
                    }
                    scheme = Some(self.parse_scheme()?);
                }
                Event::Empty(start) if start.name().as_ref() == b"data" => {
                    if lines.is_some() {
                        return Err(HarnessError::playbook(
                            "element 'expect' has more than one 'data' sub-element",
                            None,
                        ));
                    }
                    lines = Some(Vec::new());
                }
                Event::Empty(start) if start.name().as_ref() == b"scheme" => {
                    if scheme.is_some() {
                        return Err(HarnessError::playbook(
                            "element 'expect' has more than one 'scheme' sub-element",
                            None,
                        ));
                    }
                    scheme = Some(HashMap::new());
                }
                Event::Start(start) | Event::Empty(start) => {
                    return Err(unexpected_element(&start, "'data' or 'scheme'"));
                }
                Event::Text(text) if is_blank(&text) => {}
                Event::Comment(_) => {}
                Event::End(end) if end.name().as_ref() == b"expect" => break,
                Event::Eof => return Err(truncated()),
                other => return Err(unexpected_event(&other)),
            }
        }
        let Some(lines) = lines else {
            return Err(HarnessError::playbook(
                "element 'expect' is missing required sub-element 'data'",
                None,
            ));
        };
        build_screen(lines, &scheme.unwrap_or_default()).map(|screen| Expectation { screen })
    }

    /// Parses `<data>`: `<line>` elements each optionally followed by one
    /// `<attr>` of the same length.
    fn parse_data(&mut self) -> HarnessResult<Vec<(String, Option<String>)>> {
        let mut lines: Vec<(String, Option<String>)> = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(start) if start.name().as_ref() == b"line" => {
                    let text = self.element_text(b"line")?;
                    lines.push((text, None));
                }
                Event::Empty(start) if start.name().as_ref() == b"line" => {
                    lines.push((String::new(), None));
                }
                Event::Start(start) if start.name().as_ref() == b"attr" => {
                    let text = self.element_text(b"attr")?;
                    match lines.last_mut() {
                        Some((line, attr @ None)) if line.chars().count() == text.chars().count() => {
                            *attr = Some(text);
                        }
                        Some((_, Some(_))) | None => {
                            return Err(HarnessError::playbook(
                                "element 'attr' must directly follow a 'line' element",
                                None,
                            ));
                        }
                        Some(_) => {
                            return Err(HarnessError::playbook(
                                "element 'attr' does not match the length of the previous line",
                                None,
                            ));
                        }
                    }
                }
                Event::Start(start) | Event::Empty(start) => {
                    return Err(unexpected_element(&start, "'line' or 'attr'"));
                }
                Event::Text(text) if is_blank(&text) => {}
                Event::Comment(_) => {}
                Event::End(end) if end.name().as_ref() == b"data" => break,
                Event::Eof => return Err(truncated()),
                other => return Err(unexpected_event(&other)),
            }
        }
        Ok(lines)
    }

    fn parse_scheme(&mut self) -> HarnessResult<HashMap<char, StyleTriple>> {
        let mut scheme = HashMap::new();
        loop {
            match self.next_event()? {
                Event::Start(start) if start.name().as_ref() == b"color" => {
                    let (key, triple) = parse_color(&start)?;
                    scheme.insert(key, triple);
                    self.skip_to_end(b"color")?;
                }
                Event::Empty(start) if start.name().as_ref() == b"color" => {
                    let (key, triple) = parse_color(&start)?;
                    scheme.insert(key, triple);
                }
                Event::Start(start) | Event::Empty(start) => {
                    return Err(unexpected_element(&start, "'color'"));
                }
                Event::Text(text) if is_blank(&text) => {}
                Event::Comment(_) => {}
                Event::End(end) if end.name().as_ref() == b"scheme" => break,
                Event::Eof => return Err(truncated()),
                other => return Err(unexpected_event(&other)),
            }
        }
        Ok(scheme)
    }

    /// Collects the verbatim text content of an element with no children.
    fn element_text(&mut self, tag: &[u8]) -> HarnessResult<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(chunk) => {
                    let chunk = chunk.unescape().map_err(|err| {
                        HarnessError::playbook(format!("malformed playbook XML: {err}"), None)
                    })?;
                    text.push_str(&chunk);
                }
                Event::End(end) if end.name().as_ref() == tag => break,
                Event::Eof => return Err(truncated()),
                other => return Err(unexpected_event(&other)),
            }
        }
        Ok(text)
    }

    fn skip_to_end(&mut self, tag: &[u8]) -> HarnessResult<()> {
        loop {
            match self.next_event()? {
                Event::End(end) if end.name().as_ref() == tag => return Ok(()),
                Event::Text(text) if is_blank(&text) => {}
                Event::Comment(_) => {}
                Event::Eof => return Err(truncated()),
                other => return Err(unexpected_event(&other)),
            }
        }
    }
}

fn action_key(start: &BytesStart<'_>) -> HarnessResult<String> {
    let key = required_attr(start, "key")?;
    if !keys::is_known_key(&key) {
        return Err(HarnessError::playbook(
            format!("action key '{key}' is not recognized"),
            None,
        ));
    }
    Ok(key)
}

fn parse_color(start: &BytesStart<'_>) -> HarnessResult<(char, StyleTriple)> {
    let key_value = required_attr(start, "key")?;
    let mut key_chars = key_value.chars();
    let key = match (key_chars.next(), key_chars.next()) {
        (Some(key), None) => key,
        _ => {
            return Err(HarnessError::playbook(
                format!("color key '{key_value}' must be a single character"),
                None,
            ));
        }
    };
    let attributes = match optional_attr(start, "attributes")? {
        Some(value) => Attributes::from_scheme_str(&value)?,
        None => Attributes::Normal,
    };
    let foreground = match optional_attr(start, "foreground")? {
        Some(value) => Color::from_name(&value)?,
        None => Color::Default,
    };
    let background = match optional_attr(start, "background")? {
        Some(value) => Color::from_name(&value)?,
        None => Color::Default,
    };
    Ok((key, (attributes, foreground, background)))
}

/// Pads short lines and missing rows with blank cells; lines beyond the grid
/// are a format error.
fn build_screen(
    lines: Vec<(String, Option<String>)>,
    scheme: &HashMap<char, StyleTriple>,
) -> HarnessResult<Screen> {
    if lines.len() > ROWS {
        return Err(HarnessError::playbook(
            format!("snapshot has {} lines, the screen holds {ROWS}", lines.len()),
            None,
        ));
    }
    let mut screen = Screen::blank();
    for (row, (line, attr)) in lines.into_iter().enumerate() {
        if line.chars().count() > COLUMNS {
            return Err(HarnessError::playbook(
                format!("snapshot line {row} is wider than {COLUMNS} columns"),
                None,
            ));
        }
        let attr_keys: Vec<char> = match attr {
            Some(attr) => attr.chars().collect(),
            None => Vec::new(),
        };
        for (col, ch) in line.chars().enumerate() {
            let mut cell = Cell {
                ch,
                ..Cell::default()
            };
            if let Some(key) = attr_keys.get(col).copied().filter(|key| *key != ' ') {
                let Some((attributes, fg, bg)) = scheme.get(&key).copied() else {
                    return Err(HarnessError::playbook(
                        format!("color key '{key}' is not defined in the scheme"),
                        None,
                    ));
                };
                cell.attr = attributes;
                cell.fg = fg;
                cell.bg = bg;
            }
            screen.put(to_coord(row), to_coord(col), cell);
        }
    }
    Ok(screen)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn to_coord(index: usize) -> i32 {
    // Callers stay within the 24x80 grid.
    index as i32
}

fn required_attr(start: &BytesStart<'_>, name: &str) -> HarnessResult<String> {
    optional_attr(start, name)?.ok_or_else(|| {
        HarnessError::playbook(
            format!(
                "element '{}' is missing required attribute '{name}'",
                String::from_utf8_lossy(start.name().as_ref())
            ),
            None,
        )
    })
}

fn optional_attr(start: &BytesStart<'_>, name: &str) -> HarnessResult<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(|err| {
            HarnessError::playbook(format!("malformed playbook XML: {err}"), None)
        })?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| {
                HarnessError::playbook(format!("malformed playbook XML: {err}"), None)
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

fn unexpected_element(start: &BytesStart<'_>, expected: &str) -> HarnessError {
    HarnessError::playbook(
        format!(
            "element '{}' is invalid here, expected {expected}",
            String::from_utf8_lossy(start.name().as_ref())
        ),
        None,
    )
}

fn unexpected_event(event: &Event<'_>) -> HarnessError {
    HarnessError::playbook(
        format!("unexpected content in playbook document: {event:?}"),
        None,
    )
}

fn truncated() -> HarnessError {
    HarnessError::playbook("playbook document ends unexpectedly", None)
}
