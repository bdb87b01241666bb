//! Termex: an automated testing harness for terminal UI programs.
//!
//! The harness spawns a program on a pseudo-terminal, interprets its output
//! against a fixed 24x80 screen model, and either records the interaction
//! into an XML playbook or replays a playbook and verifies that the screen
//! goes through the recorded states.

#![forbid(unsafe_code)]
// Public API types have docs; internal items are documented where the
// behavior is not obvious from the name.
#![allow(missing_docs)]

pub mod engine;
pub mod error;
pub mod interpret;
pub mod keys;
pub mod model;
pub mod playbook;
pub mod report;
pub mod session;

pub use crate::engine::{replay, Mode, Recorder, TestVerdict};
pub use crate::error::{ErrorCode, HarnessError, HarnessResult};
pub use crate::interpret::{Interpreter, ScreenSink};
pub use crate::model::{Attributes, Cell, Color, Screen, COLUMNS, ROWS};
pub use crate::playbook::{Expectation, Playbook, PlaybookNode};
pub use crate::report::FailureReport;
pub use crate::session::{PtySession, SessionConfig, CHILD_TIMEOUT};
