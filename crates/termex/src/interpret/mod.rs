//! Escape-sequence interpreter and screen state machine.
//!
//! Bytes from the pty are accumulated one at a time; after each byte the
//! buffer is classified against the recognized control units in a fixed
//! priority order. A complete unit mutates the screen/cursor state and clears
//! the buffer; anything else leaves the buffer in place and waits for more
//! input. A malformed sequence therefore never crashes the interpreter, it
//! just keeps the buffer growing until a recognizable unit appears.

use crate::model::cell::{Attributes, Cell, Color};
use crate::model::screen::{resolve_index, Screen, COLUMNS, ROWS};

// Grid bounds in cursor coordinates. The grid is small and fixed, the casts
// cannot truncate.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const ROW_LIMIT: i32 = ROWS as i32;
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const COLUMN_LIMIT: i32 = COLUMNS as i32;

/// One complete recognized unit of terminal input.
///
/// The variants cover the deliberately small control-code subset this harness
/// understands; everything else is held as "not yet complete".
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlUnit {
    /// Maximal run of non-control bytes, decoded as UTF-8.
    Text(String),
    /// `0x07`.
    Bell,
    /// `0x08`; moves the cursor left without clamping.
    Backspace,
    /// `0x0d`.
    CarriageReturn,
    /// `0x0a`; cursor down with scroll at the last row.
    LineFeed,
    /// `ESC [ <n> @`.
    InsertBlanks(usize),
    /// `ESC [ H`.
    CursorHome,
    /// `ESC [ <row> ; <col> H`, coordinates taken verbatim.
    CursorPosition { row: i32, col: i32 },
    /// `ESC [ K`.
    EraseLineToEnd,
    /// `ESC [ 2 J`.
    EraseDisplay,
    /// `ESC [ m`.
    ResetAttributes,
    /// `ESC [ 7 m`.
    ReverseVideo,
    /// `ESC [ 3<n> m` with a valid color id.
    SetForeground(Color),
    /// `ESC [ 4<n> m` with a valid color id.
    SetBackground(Color),
    /// `ESC [ ? 25 l`; accepted and ignored.
    HideCursor,
}

fn is_control_byte(byte: u8) -> bool {
    (0x01..=0x1f).contains(&byte)
}

fn parse_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() {
        return None;
    }
    bytes.iter().try_fold(0u32, |acc, byte| {
        if byte.is_ascii_digit() {
            acc.checked_mul(10)?.checked_add(u32::from(byte - b'0'))
        } else {
            None
        }
    })
}

fn parse_coordinate(bytes: &[u8]) -> Option<i32> {
    parse_digits(bytes).and_then(|value| i32::try_from(value).ok())
}

/// Classify a parameterized CSI body (the bytes between `ESC[` and the end of
/// the buffer, final byte included).
fn classify_csi(body: &[u8]) -> Option<ControlUnit> {
    match body {
        b"H" => return Some(ControlUnit::CursorHome),
        b"K" => return Some(ControlUnit::EraseLineToEnd),
        b"2J" => return Some(ControlUnit::EraseDisplay),
        b"m" => return Some(ControlUnit::ResetAttributes),
        b"7m" => return Some(ControlUnit::ReverseVideo),
        b"?25l" => return Some(ControlUnit::HideCursor),
        _ => {}
    }

    let (final_byte, params) = body.split_last()?;
    match final_byte {
        b'@' => parse_digits(params)
            .and_then(|count| usize::try_from(count).ok())
            .map(ControlUnit::InsertBlanks),
        b'H' => {
            let mut parts = params.splitn(2, |byte| *byte == b';');
            let row = parse_coordinate(parts.next()?)?;
            let col = parse_coordinate(parts.next()?)?;
            Some(ControlUnit::CursorPosition { row, col })
        }
        b'm' => {
            let (selector, code) = params.split_first()?;
            // An out-of-range color id is reported as unrecognized, not
            // silently accepted.
            let color = Color::from_code(parse_digits(code)?)?;
            match selector {
                b'3' => Some(ControlUnit::SetForeground(color)),
                b'4' => Some(ControlUnit::SetBackground(color)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Try to classify the accumulated buffer as one complete unit.
///
/// `None` means "keep accumulating": the buffer is either a prefix of a longer
/// sequence, an incomplete UTF-8 character, or genuinely unrecognized input.
/// The three cases are indistinguishable at this level.
pub fn classify(buffer: &[u8]) -> Option<ControlUnit> {
    if buffer.is_empty() {
        return None;
    }

    if buffer.iter().all(|byte| !is_control_byte(*byte)) {
        // Decode failure is assumed to be an incomplete multi-byte character.
        return std::str::from_utf8(buffer)
            .ok()
            .map(|text| ControlUnit::Text(text.to_string()));
    }

    match buffer {
        [0x07] => return Some(ControlUnit::Bell),
        [0x08] => return Some(ControlUnit::Backspace),
        [0x0d] => return Some(ControlUnit::CarriageReturn),
        [0x0a] => return Some(ControlUnit::LineFeed),
        _ => {}
    }

    buffer
        .strip_prefix(b"\x1b[")
        .and_then(classify_csi)
}

/// Notification interface for a cooperating display.
///
/// The interpreter never depends on a concrete display; a sink observes
/// screen updates and may render them however it likes. It must not mutate
/// the screen model.
pub trait ScreenSink {
    /// A cell at a resolved grid position changed.
    fn cell_changed(&mut self, _row: usize, _col: usize, _cell: &Cell) {}
    /// The program rang the terminal bell.
    fn bell(&mut self) {}
    /// The screen scrolled up by one row.
    fn scrolled(&mut self) {}
    /// The screen was erased completely.
    fn cleared(&mut self) {}
}

/// Cursor position plus the pending styling stamped onto the next print.
///
/// Coordinates are deliberately unclamped: backspace can take the column
/// negative and `ESC[<r>;<c>H` stores whatever it was given.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CursorState {
    pub row: i32,
    pub col: i32,
    pub attr: Attributes,
    pub fg: Color,
    pub bg: Color,
}

/// The escape-sequence interpreter: owns the screen, the cursor state and the
/// partially-accumulated byte buffer.
pub struct Interpreter {
    screen: Screen,
    cursor: CursorState,
    buffer: Vec<u8>,
    sink: Option<Box<dyn ScreenSink>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter over a blank screen with no display attached.
    pub fn new() -> Self {
        Self {
            screen: Screen::blank(),
            cursor: CursorState::default(),
            buffer: Vec::new(),
            sink: None,
        }
    }

    /// An interpreter that notifies `sink` of screen updates.
    pub fn with_sink(sink: Box<dyn ScreenSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// The live screen.
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Current cursor state, unclamped.
    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    /// Bytes accumulated towards a not-yet-complete sequence.
    pub fn pending_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed one byte from the pty.
    pub fn receive_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
        match classify(&self.buffer) {
            Some(unit) => {
                self.buffer.clear();
                self.apply(unit);
            }
            None => {
                tracing::trace!(buffer = ?self.buffer, "unmatched byte sequence");
            }
        }
    }

    /// Feed a chunk of bytes, one at a time.
    pub fn receive_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.receive_byte(*byte);
        }
    }

    fn apply(&mut self, unit: ControlUnit) {
        match unit {
            ControlUnit::Text(text) => {
                for ch in text.chars() {
                    self.print_char(ch);
                }
            }
            ControlUnit::Bell => {
                if let Some(sink) = self.sink.as_mut() {
                    sink.bell();
                }
            }
            ControlUnit::Backspace => self.cursor.col -= 1,
            ControlUnit::CarriageReturn => self.cursor.col = 0,
            ControlUnit::LineFeed => self.cursor_down(),
            ControlUnit::InsertBlanks(count) => {
                self.screen
                    .insert_blanks(self.cursor.row, self.cursor.col, count);
            }
            ControlUnit::CursorHome => {
                self.cursor.row = 0;
                self.cursor.col = 0;
            }
            ControlUnit::CursorPosition { row, col } => {
                self.cursor.row = row;
                self.cursor.col = col;
            }
            ControlUnit::EraseLineToEnd => {
                self.screen.erase_line_from(self.cursor.row, self.cursor.col);
            }
            ControlUnit::EraseDisplay => {
                self.screen.erase_all();
                self.cursor.row = 0;
                self.cursor.col = 0;
                if let Some(sink) = self.sink.as_mut() {
                    sink.cleared();
                }
            }
            ControlUnit::ResetAttributes => self.cursor.attr = Attributes::Normal,
            ControlUnit::ReverseVideo => self.cursor.attr = Attributes::Reverse,
            ControlUnit::SetForeground(color) => self.cursor.fg = color,
            ControlUnit::SetBackground(color) => self.cursor.bg = color,
            ControlUnit::HideCursor => {}
        }
    }

    fn print_char(&mut self, ch: char) {
        let cell = Cell::styled(ch, self.cursor.attr, self.cursor.fg, self.cursor.bg);
        self.screen.put(self.cursor.row, self.cursor.col, cell);
        if let Some(sink) = self.sink.as_mut() {
            if let Some((row, col)) =
                resolve_index(self.cursor.row, ROWS).zip(resolve_index(self.cursor.col, COLUMNS))
            {
                sink.cell_changed(row, col, &cell);
            }
        }

        self.cursor.col += 1;
        if self.cursor.col == COLUMN_LIMIT {
            self.cursor.col = 0;
            self.cursor_down();
        }
    }

    fn cursor_down(&mut self) {
        if self.cursor.row < ROW_LIMIT - 1 {
            self.cursor.row += 1;
        } else {
            self.screen.scroll_up();
            self.cursor.row = ROW_LIMIT - 1;
            if let Some(sink) = self.sink.as_mut() {
                sink.scrolled();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_needs_complete_csi() {
        assert_eq!(classify(b"\x1b"), None);
        assert_eq!(classify(b"\x1b["), None);
        assert_eq!(classify(b"\x1b[3"), None);
        assert_eq!(classify(b"\x1b[31"), None);
        assert_eq!(
            classify(b"\x1b[31m"),
            Some(ControlUnit::SetForeground(Color::Red))
        );
    }

    #[test]
    fn classify_rejects_invalid_color_code() {
        assert_eq!(classify(b"\x1b[38m"), None);
        assert_eq!(classify(b"\x1b[48m"), None);
        assert_eq!(
            classify(b"\x1b[39m"),
            Some(ControlUnit::SetForeground(Color::Default))
        );
    }

    #[test]
    fn classify_cursor_position_is_verbatim() {
        assert_eq!(
            classify(b"\x1b[12;40H"),
            Some(ControlUnit::CursorPosition { row: 12, col: 40 })
        );
        assert_eq!(
            classify(b"\x1b[99;999H"),
            Some(ControlUnit::CursorPosition { row: 99, col: 999 })
        );
    }

    #[test]
    fn incomplete_utf8_is_held() {
        // First byte of a two-byte encoding ("é" = 0xc3 0xa9).
        assert_eq!(classify(&[0xc3]), None);
        assert_eq!(
            classify(&[0xc3, 0xa9]),
            Some(ControlUnit::Text("é".to_string()))
        );
    }

    #[test]
    fn backspace_goes_negative() {
        let mut term = Interpreter::new();
        term.receive_byte(0x08);
        assert_eq!(term.cursor().col, -1);
    }

    #[test]
    fn unmatched_buffer_is_retained() {
        let mut term = Interpreter::new();
        term.receive_bytes(b"\x1b[38m");
        assert_eq!(term.pending_bytes(), b"\x1b[38m");
    }
}
