//! On-screen cell model: characters, attributes and colors.
//!
//! Colors are stored pre-translation: a cell may hold [`Color::Default`] and is
//! only resolved to a concrete color at render/compare time, with reverse video
//! swapping the resolved pair. Recorded expectations rely on the stored form.

use crate::error::{HarnessError, HarnessResult};

/// Concrete color resolved for a default foreground.
pub const DEFAULT_FOREGROUND: Color = Color::Black;
/// Concrete color resolved for a default background.
pub const DEFAULT_BACKGROUND: Color = Color::White;

/// The eight named terminal colors plus the unresolved default sentinel.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    /// Resolved to [`DEFAULT_FOREGROUND`]/[`DEFAULT_BACKGROUND`] only at
    /// render or comparison time.
    Default,
}

impl Default for Color {
    fn default() -> Self {
        Self::Default
    }
}

impl Color {
    /// Map an SGR color code (the `<n>` of `ESC[3<n>m`/`ESC[4<n>m`) to a color.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Black),
            1 => Some(Self::Red),
            2 => Some(Self::Green),
            3 => Some(Self::Yellow),
            4 => Some(Self::Blue),
            5 => Some(Self::Magenta),
            6 => Some(Self::Cyan),
            7 => Some(Self::White),
            9 => Some(Self::Default),
            _ => None,
        }
    }

    /// The SGR color code for this color.
    pub fn code(self) -> u32 {
        match self {
            Self::Black => 0,
            Self::Red => 1,
            Self::Green => 2,
            Self::Yellow => 3,
            Self::Blue => 4,
            Self::Magenta => 5,
            Self::Cyan => 6,
            Self::White => 7,
            Self::Default => 9,
        }
    }

    /// Name used in playbook scheme attributes.
    pub fn name(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
            Self::Default => "default",
        }
    }

    /// Parse a playbook color name.
    pub fn from_name(name: &str) -> HarnessResult<Self> {
        match name {
            "black" => Ok(Self::Black),
            "red" => Ok(Self::Red),
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "blue" => Ok(Self::Blue),
            "magenta" => Ok(Self::Magenta),
            "cyan" => Ok(Self::Cyan),
            "white" => Ok(Self::White),
            "default" => Ok(Self::Default),
            other => Err(HarnessError::playbook(
                format!("unrecognized color '{other}'"),
                serde_json::json!({ "received": other }),
            )),
        }
    }
}

/// Character attributes. Reverse is sticky: the only way back to normal is a
/// full attribute reset (`ESC[m`).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Attributes {
    #[default]
    Normal,
    Reverse,
}

impl Attributes {
    /// Whether reverse video is active.
    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse)
    }

    /// Pipe-joined form used in playbook scheme attributes; empty for normal.
    pub fn as_scheme_str(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Reverse => "reverse",
        }
    }

    /// Parse a pipe-joined attribute string (`normal`, `reverse`,
    /// `normal|reverse`, ...).
    pub fn from_scheme_str(value: &str) -> HarnessResult<Self> {
        let mut result = Self::Normal;
        for part in value.split('|') {
            match part {
                "normal" => {}
                "reverse" => result = Self::Reverse,
                other => {
                    return Err(HarnessError::playbook(
                        format!("unrecognized attribute '{other}'"),
                        serde_json::json!({ "received": value }),
                    ));
                }
            }
        }
        Ok(result)
    }
}

/// One character of the screen grid with its pending-at-print styling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cell {
    /// Displayed character.
    pub ch: char,
    /// Character attributes.
    pub attr: Attributes,
    /// Stored (pre-translation) foreground color.
    pub fg: Color,
    /// Stored (pre-translation) background color.
    pub bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            attr: Attributes::Normal,
            fg: Color::Default,
            bg: Color::Default,
        }
    }
}

impl Cell {
    /// Build a cell with explicit styling.
    pub fn styled(ch: char, attr: Attributes, fg: Color, bg: Color) -> Self {
        Self { ch, attr, fg, bg }
    }

    fn translated_fg(&self) -> Color {
        if self.fg == Color::Default {
            DEFAULT_FOREGROUND
        } else {
            self.fg
        }
    }

    fn translated_bg(&self) -> Color {
        if self.bg == Color::Default {
            DEFAULT_BACKGROUND
        } else {
            self.bg
        }
    }

    /// Final foreground to display, after default translation and reverse swap.
    pub fn resolved_fg(&self) -> Color {
        if self.attr.is_reverse() {
            self.translated_bg()
        } else {
            self.translated_fg()
        }
    }

    /// Final background to display, after default translation and reverse swap.
    pub fn resolved_bg(&self) -> Color {
        if self.attr.is_reverse() {
            self.translated_fg()
        } else {
            self.translated_bg()
        }
    }
}
