//! Replay and recording logic.
//!
//! [`replay`] drives a spawned program through a playbook: actions are sent
//! as soon as they come up, and each expectation is re-checked after every
//! byte of output until the screen matches or the wait budget runs out.
//! [`Recorder`] accumulates the keystrokes and snapshots of an interactive
//! session into a playbook.

use crate::error::HarnessResult;
use crate::interpret::Interpreter;
use crate::model::screen::Screen;
use crate::playbook::{Expectation, Playbook, PlaybookNode};
use crate::report::FailureReport;
use crate::session::{PollOutcome, PtySession, ReadOutcome, SessionConfig, CHILD_TIMEOUT};

/// What the harness is doing with the program under test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Interactive passthrough, nothing recorded.
    Run,
    /// Interactive passthrough, keystrokes and captures collected.
    Record,
    /// Scripted replay of an existing playbook.
    Test,
}

/// Collects an interactive session into a playbook.
#[derive(Debug, Default)]
pub struct Recorder {
    nodes: Vec<PlaybookNode>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a keystroke that was forwarded to the child.
    pub fn record_key(&mut self, key: impl Into<String>) {
        self.nodes.push(PlaybookNode::Action { key: key.into() });
    }

    /// Append a snapshot of the current screen as an expectation.
    pub fn capture(&mut self, screen: &Screen) {
        self.nodes.push(PlaybookNode::Expect(Expectation {
            screen: screen.clone(),
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_playbook(self) -> Playbook {
        Playbook::new(self.nodes)
    }
}

/// Outcome of a scripted replay.
///
/// A failed verdict is a normal return, not an error: the harness worked,
/// the program under test did not behave as recorded.
#[derive(Debug)]
pub enum TestVerdict {
    Passed,
    Failed {
        /// Short human-readable reason.
        reason: String,
        /// Expected/actual screens when an expectation was pending.
        report: Option<FailureReport>,
    },
}

impl TestVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Spawn the program and replay the playbook against it.
///
/// The session is always finalized, including when the run aborts with a
/// hard error: on a passing run an unresponsive child turns the verdict
/// into an error, on a failing or aborted run finalization problems are
/// only logged so the original outcome survives.
///
/// # Errors
/// Hard harness errors only (spawn, pty I/O, snapshot serialization); see
/// [`TestVerdict`] for behavioral failures.
pub fn replay(config: &SessionConfig, playbook: &Playbook) -> HarnessResult<TestVerdict> {
    let mut session = PtySession::spawn(config)?;
    match drive(&mut session, playbook) {
        Ok(verdict) => {
            if verdict.passed() {
                session.finalize()?;
            } else if let Err(err) = session.finalize() {
                tracing::warn!(%err, "cleanup after failed run");
            }
            Ok(verdict)
        }
        Err(run_err) => {
            if let Err(err) = session.finalize() {
                tracing::warn!(%err, "cleanup after aborted run");
            }
            Err(run_err)
        }
    }
}

struct Cursor<'p> {
    nodes: &'p [PlaybookNode],
    next: usize,
}

impl<'p> Cursor<'p> {
    fn remaining(&self) -> usize {
        self.nodes.len().saturating_sub(self.next)
    }

    fn take(&mut self) -> Option<&'p PlaybookNode> {
        let node = self.nodes.get(self.next)?;
        self.next += 1;
        Some(node)
    }
}

fn drive(session: &mut PtySession, playbook: &Playbook) -> HarnessResult<TestVerdict> {
    let mut interpreter = Interpreter::new();
    let mut cursor = Cursor {
        nodes: playbook.nodes(),
        next: 0,
    };
    let mut pending: Option<&Expectation> = None;

    send_until_expectation(session, &mut cursor, &mut pending)?;

    loop {
        match session.wait_readable(CHILD_TIMEOUT)? {
            PollOutcome::TimedOut => {
                return failed(
                    "program is not responding",
                    pending,
                    interpreter.screen(),
                );
            }
            PollOutcome::Closed => {
                return closed_verdict(&cursor, pending, interpreter.screen());
            }
            PollOutcome::DataReady => match session.read_byte()? {
                ReadOutcome::Byte(byte) => {
                    interpreter.receive_byte(byte);
                    if let Some(expectation) = pending {
                        if interpreter.screen().matches_rendered(&expectation.screen) {
                            tracing::debug!(step = cursor.next, "expectation met");
                            pending = None;
                            send_until_expectation(session, &mut cursor, &mut pending)?;
                        }
                    }
                }
                ReadOutcome::WouldBlock => {}
                ReadOutcome::Closed => {
                    return closed_verdict(&cursor, pending, interpreter.screen());
                }
            },
        }
    }
}

/// Send queued actions until an expectation (or the end) is reached.
fn send_until_expectation<'p>(
    session: &mut PtySession,
    cursor: &mut Cursor<'p>,
    pending: &mut Option<&'p Expectation>,
) -> HarnessResult<()> {
    while pending.is_none() {
        match cursor.take() {
            Some(PlaybookNode::Action { key }) => session.send_key(key)?,
            Some(PlaybookNode::Expect(expectation)) => *pending = Some(expectation),
            None => break,
        }
    }
    Ok(())
}

fn closed_verdict(
    cursor: &Cursor<'_>,
    pending: Option<&Expectation>,
    screen: &Screen,
) -> HarnessResult<TestVerdict> {
    if pending.is_none() && cursor.remaining() == 0 {
        Ok(TestVerdict::Passed)
    } else {
        failed(
            "program closed the connection while playbook steps remain",
            pending,
            screen,
        )
    }
}

fn failed(
    reason: &str,
    pending: Option<&Expectation>,
    screen: &Screen,
) -> HarnessResult<TestVerdict> {
    let report = match pending {
        Some(expectation) => Some(FailureReport::new(&expectation.screen, screen)?),
        None => None,
    };
    Ok(TestVerdict::Failed {
        reason: reason.to_string(),
        report,
    })
}
