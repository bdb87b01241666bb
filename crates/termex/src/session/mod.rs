//! Pty-backed child process sessions.
//!
//! [`PtySession`] spawns the program under test on the slave side of a
//! pseudo-terminal sized to the fixed 24x80 grid and exposes the master side
//! through two primitives the replay engine is built on:
//!
//! - [`PtySession::wait_readable`] blocks until output arrives, the child
//!   closes its end, or a timeout expires.
//! - [`PtySession::read_byte`] pulls exactly one byte without blocking, so
//!   the caller can interleave screen interpretation with expectation checks
//!   at byte granularity.
//!
//! The child runs in a deliberately minimal environment (`TERM=termex`, a
//! two-entry `PATH`, a fixed locale) so recordings replay identically across
//! machines.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(unix)]
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};

use crate::error::{HarnessError, HarnessResult};
use crate::keys;
use crate::model::screen::{COLUMNS, ROWS};

/// How long the harness waits for the child: for output while replaying, and
/// for exit while finalizing.
pub const CHILD_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between non-blocking read attempts while waiting for output.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Terminal type advertised to the child.
pub const TERM_NAME: &str = "termex";

/// Result of waiting for pty output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// At least one byte can be read without blocking.
    DataReady,
    /// Nothing arrived within the wait budget.
    TimedOut,
    /// The child closed its side of the pty.
    Closed,
}

/// Result of a single non-blocking read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// One byte of child output.
    Byte(u8),
    /// No data available right now.
    WouldBlock,
    /// The child closed its side of the pty.
    Closed,
}

/// Configuration for spawning a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Program to execute, invoked with no arguments.
    pub program: String,
    /// Directory for the `TERMINFO` variable; when absent the variable is
    /// inherited from the harness environment if set there.
    pub terminfo: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            terminfo: None,
        }
    }

    #[must_use]
    pub fn terminfo(mut self, dir: Option<&Path>) -> Self {
        self.terminfo = dir.map(Path::to_path_buf);
        self
    }
}

/// A live pty session around the program under test.
pub struct PtySession {
    master: Option<Box<dyn portable_pty::MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    reader: Option<Box<dyn Read + Send>>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    /// One byte read ahead by `wait_readable`, handed out by `read_byte`.
    lookahead: Option<u8>,
}

impl PtySession {
    /// Spawn the program on a fresh 24x80 pty.
    ///
    /// # Errors
    /// Returns `E_SPAWN` if pty creation or program start fails, and
    /// `E_CONNECTION` if the master descriptor cannot be switched to
    /// non-blocking mode.
    #[allow(clippy::cast_possible_truncation)]
    pub fn spawn(config: &SessionConfig) -> HarnessResult<Self> {
        let system = native_pty_system();
        // ROWS and COLUMNS are small compile-time constants.
        let pair = system
            .openpty(PtySize {
                rows: ROWS as u16,
                cols: COLUMNS as u16,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| HarnessError::spawn("failed to open pty", err))?;

        let mut cmd = CommandBuilder::new(&config.program);
        cmd.env_clear();
        cmd.env("PATH", "/bin:/usr/bin");
        cmd.env("TERM", TERM_NAME);
        cmd.env("LC_ALL", "en_US.UTF-8");
        if let Some(dir) = &config.terminfo {
            cmd.env("TERMINFO", dir);
        } else if let Ok(dir) = std::env::var("TERMINFO") {
            cmd.env("TERMINFO", dir);
        }

        tracing::debug!(program = %config.program, "spawning program under test");
        let child = pair.slave.spawn_command(cmd).map_err(|err| {
            HarnessError::spawn(format!("failed to start '{}'", config.program), err)
        })?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| HarnessError::spawn("failed to clone pty reader", err))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| HarnessError::spawn("failed to take pty writer", err))?;

        #[cfg(unix)]
        {
            if let Some(fd) = pair.master.as_raw_fd() {
                let flags = OFlag::from_bits_truncate(
                    fcntl(fd, FcntlArg::F_GETFL)
                        .map_err(|err| HarnessError::connection("failed to get fd flags", err))?,
                );
                fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
                    .map_err(|err| HarnessError::connection("failed to set nonblocking", err))?;
            }
        }

        Ok(Self {
            master: Some(pair.master),
            writer: Some(writer),
            reader: Some(reader),
            child,
            lookahead: None,
        })
    }

    /// Encode and send one abstract key to the child.
    ///
    /// # Errors
    /// `E_PLAYBOOK` for an unrecognized key name, `E_CONNECTION` if the pty
    /// write fails.
    pub fn send_key(&mut self, key: &str) -> HarnessResult<()> {
        let bytes = keys::encode_key(key)?;
        let Some(writer) = self.writer.as_mut() else {
            return Err(HarnessError::connection(
                "cannot send key",
                "pty writer already closed",
            ));
        };
        tracing::trace!(key, "sending key");
        writer
            .write_all(&bytes)
            .and_then(|()| writer.flush())
            .map_err(|err| HarnessError::connection(format!("failed to send key '{key}'"), err))
    }

    /// Block until output is available, the child hangs up, or `timeout`
    /// expires.
    ///
    /// # Errors
    /// `E_CONNECTION` on an unexpected read error.
    pub fn wait_readable(&mut self, timeout: Duration) -> HarnessResult<PollOutcome> {
        if self.lookahead.is_some() {
            return Ok(PollOutcome::DataReady);
        }
        let deadline = Instant::now() + timeout;
        loop {
            match self.poll_byte()? {
                ReadOutcome::Byte(byte) => {
                    self.lookahead = Some(byte);
                    return Ok(PollOutcome::DataReady);
                }
                ReadOutcome::Closed => return Ok(PollOutcome::Closed),
                ReadOutcome::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Ok(PollOutcome::TimedOut);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    /// Pull one byte of child output without blocking.
    ///
    /// # Errors
    /// `E_CONNECTION` on an unexpected read error.
    pub fn read_byte(&mut self) -> HarnessResult<ReadOutcome> {
        if let Some(byte) = self.lookahead.take() {
            return Ok(ReadOutcome::Byte(byte));
        }
        self.poll_byte()
    }

    fn poll_byte(&mut self) -> HarnessResult<ReadOutcome> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(ReadOutcome::Closed);
        };
        let mut buffer = [0u8; 1];
        match reader.read(&mut buffer) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(_) => {
                let [byte] = buffer;
                Ok(ReadOutcome::Byte(byte))
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            // On Linux the master read fails with EIO once the slave side is
            // fully closed; that is an orderly hangup, not a failure.
            Err(err) if err.raw_os_error() == Some(nix::libc::EIO) => Ok(ReadOutcome::Closed),
            Err(err) => Err(HarnessError::connection("failed to read pty", err)),
        }
    }

    /// Whether the child has already exited.
    pub fn child_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Close the pty and wait for the child to exit on its own.
    ///
    /// The child is polled once per second for up to [`CHILD_TIMEOUT`]; it is
    /// never signalled, so a program that ignores the hangup is reported as
    /// an error rather than killed behind the caller's back.
    ///
    /// # Errors
    /// `E_TIMEOUT` if the child is still running after the wait budget,
    /// `E_CONNECTION` if its status cannot be polled.
    pub fn finalize(mut self) -> HarnessResult<()> {
        self.close_pty();
        for _ in 0..CHILD_TIMEOUT.as_secs() {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(?status, "program exited");
                    return Ok(());
                }
                Ok(None) => std::thread::sleep(Duration::from_secs(1)),
                Err(err) => {
                    return Err(HarnessError::connection("failed to poll child exit", err));
                }
            }
        }
        Err(HarnessError::timeout(
            "program did not exit after pty close",
            serde_json::json!({ "waited_secs": CHILD_TIMEOUT.as_secs() }),
        ))
    }

    /// Drops the writer, reader and master, closing the child's controlling
    /// terminal.
    fn close_pty(&mut self) {
        self.writer = None;
        self.reader = None;
        self.master = None;
        self.lookahead = None;
    }
}

impl Drop for PtySession {
    /// Best-effort cleanup so an aborted run does not leak the child.
    ///
    /// Closes the pty, gives the child a moment to exit, then kills it.
    /// Errors are ignored; for controlled shutdown use
    /// [`finalize`](Self::finalize).
    fn drop(&mut self) {
        self.close_pty();
        let deadline = Instant::now() + Duration::from_millis(100);
        while Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let _ = self.child.kill();
    }
}
