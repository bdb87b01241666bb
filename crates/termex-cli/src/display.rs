//! Interactive mirror of the program under test.
//!
//! The local terminal is switched to raw mode and an alternate screen; key
//! presses are translated to the abstract key names the harness understands
//! and forwarded to the child, while child output flows through the
//! interpreter and is painted cell by cell. Screen updates arrive over a
//! channel from a [`ScreenSink`] installed on the interpreter, so painting
//! stays decoupled from interpretation.
//!
//! Controls: Ctrl+Q ends the session; in record mode F12 captures the
//! current screen as an expectation.

use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Print, SetBackgroundColor, SetForegroundColor},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use miette::{IntoDiagnostic, Result};
use termex::{
    Cell, Color, Interpreter, Mode, PtySession, Recorder, Screen, ScreenSink, SessionConfig,
};
use termex::session::ReadOutcome;

/// How long one iteration of the event loop waits for a key press.
const INPUT_POLL: Duration = Duration::from_millis(10);

/// Screen updates forwarded from the interpreter to the painter.
enum DisplayEvent {
    Cell { row: usize, col: usize, cell: Cell },
    Bell,
    /// Scroll or erase invalidated the incremental state; repaint everything.
    Repaint,
}

struct EventSink {
    tx: Sender<DisplayEvent>,
}

impl ScreenSink for EventSink {
    fn cell_changed(&mut self, row: usize, col: usize, cell: &Cell) {
        let _ = self.tx.send(DisplayEvent::Cell {
            row,
            col,
            cell: *cell,
        });
    }

    fn bell(&mut self) {
        let _ = self.tx.send(DisplayEvent::Bell);
    }

    fn scrolled(&mut self) {
        let _ = self.tx.send(DisplayEvent::Repaint);
    }

    fn cleared(&mut self) {
        let _ = self.tx.send(DisplayEvent::Repaint);
    }
}

/// Restores the local terminal even when the session errors out mid-loop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().into_diagnostic()?;
        execute!(io::stdout(), EnterAlternateScreen, Hide).into_diagnostic()?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
        let _ = disable_raw_mode();
    }
}

/// Run the program with the local terminal attached.
///
/// Returns the process exit code for the CLI: always 0 unless the session
/// itself fails (which is reported as an error instead).
pub fn interactive(
    program: &str,
    terminfo: Option<&Path>,
    mode: Mode,
    playbook_path: Option<&Path>,
) -> Result<i32> {
    let config = SessionConfig::new(program).terminfo(terminfo);
    let mut session = PtySession::spawn(&config)?;

    let (tx, rx) = mpsc::channel();
    let mut interpreter = Interpreter::with_sink(Box::new(EventSink { tx }));
    let mut recorder = match mode {
        Mode::Record => Some(Recorder::new()),
        Mode::Run | Mode::Test => None,
    };

    // The session is finalized on every exit path, including a hard error
    // inside the event loop; Drop alone would not give the child its full
    // grace period.
    if let Err(err) = mirror_session(&mut session, &mut interpreter, &rx, recorder.as_mut()) {
        if let Err(cleanup) = session.finalize() {
            eprintln!("Note: {cleanup}");
        }
        return Err(err);
    }

    if let (Some(recorder), Some(path)) = (recorder, playbook_path) {
        recorder.into_playbook().save(path)?;
        println!("Playbook written to '{}'.", path.display());
    }

    if let Err(err) = session.finalize() {
        eprintln!("Note: {err}");
    }
    Ok(0)
}

/// Terminal setup, initial paint and the event loop; the guard restores the
/// local terminal whether the loop returns or errors.
fn mirror_session(
    session: &mut PtySession,
    interpreter: &mut Interpreter,
    rx: &Receiver<DisplayEvent>,
    recorder: Option<&mut Recorder>,
) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    paint_full(interpreter.screen())?;
    event_loop(session, interpreter, rx, recorder)
}

fn event_loop(
    session: &mut PtySession,
    interpreter: &mut Interpreter,
    rx: &Receiver<DisplayEvent>,
    mut recorder: Option<&mut Recorder>,
) -> Result<()> {
    loop {
        // Local keyboard first.
        if event::poll(INPUT_POLL).into_diagnostic()? {
            match event::read().into_diagnostic()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if is_shutdown(&key) {
                        return Ok(());
                    }
                    if key.code == KeyCode::F(12) {
                        if let Some(recorder) = recorder.as_deref_mut() {
                            recorder.capture(interpreter.screen());
                        }
                        continue;
                    }
                    match translate_key(&key) {
                        Some(name) => {
                            session.send_key(&name)?;
                            if let Some(recorder) = recorder.as_deref_mut() {
                                recorder.record_key(name);
                            }
                        }
                        None => tracing::debug!(?key, "ignoring unsupported key"),
                    }
                }
                _ => {}
            }
        }

        // Then everything the child produced since the last pass.
        loop {
            match session.read_byte()? {
                ReadOutcome::Byte(byte) => interpreter.receive_byte(byte),
                ReadOutcome::WouldBlock => break,
                ReadOutcome::Closed => {
                    flush_display(rx, interpreter.screen())?;
                    return Ok(());
                }
            }
        }

        flush_display(rx, interpreter.screen())?;
    }
}

fn is_shutdown(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q')
}

/// Map a local key press to the abstract key name the playbook format uses.
fn translate_key(key: &KeyEvent) -> Option<String> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Char(ch) => Some(ch.to_string()),
        KeyCode::Enter => Some("Enter".to_string()),
        KeyCode::PageUp => Some("PageUp".to_string()),
        KeyCode::PageDown => Some("PageDown".to_string()),
        KeyCode::F(n) if (1..=11).contains(&n) => Some(format!("F{n}")),
        _ => None,
    }
}

fn flush_display(rx: &Receiver<DisplayEvent>, screen: &Screen) -> Result<()> {
    let mut out = io::stdout();
    let mut repaint = false;
    for update in rx.try_iter() {
        match update {
            DisplayEvent::Cell { row, col, cell } => {
                if !repaint {
                    paint_cell(&mut out, row, col, &cell)?;
                }
            }
            DisplayEvent::Bell => {
                queue!(out, Print('\u{7}')).into_diagnostic()?;
            }
            DisplayEvent::Repaint => repaint = true,
        }
    }
    if repaint {
        paint_screen(&mut out, screen)?;
    }
    out.flush().into_diagnostic()?;
    Ok(())
}

fn paint_full(screen: &Screen) -> Result<()> {
    let mut out = io::stdout();
    paint_screen(&mut out, screen)?;
    out.flush().into_diagnostic()?;
    Ok(())
}

fn paint_screen(out: &mut impl Write, screen: &Screen) -> Result<()> {
    for (row, line) in screen.rows().enumerate() {
        for (col, cell) in line.iter().enumerate() {
            paint_cell(out, row, col, cell)?;
        }
    }
    Ok(())
}

fn paint_cell(out: &mut impl Write, row: usize, col: usize, cell: &Cell) -> Result<()> {
    let (Ok(row), Ok(col)) = (u16::try_from(row), u16::try_from(col)) else {
        return Ok(());
    };
    queue!(
        out,
        MoveTo(col, row),
        SetForegroundColor(style_color(cell.resolved_fg())),
        SetBackgroundColor(style_color(cell.resolved_bg())),
        Print(cell.ch),
    )
    .into_diagnostic()?;
    Ok(())
}

/// Resolved colors never include `Default`, but the match stays exhaustive.
fn style_color(color: Color) -> crossterm::style::Color {
    use crossterm::style::Color as TermColor;
    match color {
        Color::Black | Color::Default => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::White => TermColor::Grey,
    }
}
