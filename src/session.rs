use nix::sys::signal::{Signal, kill};
use nix::sys::termios::{SetArg, Termios, tcgetattr, tcsetattr};
use nix::unistd::{Pid, getpgrp, getpid, setpgid, tcgetpgrp, tcsetpgrp};
use std::env as stdenv;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::{debug, warn};

/// State owned by the dispatch loop for the whole lifetime of the shell.
///
/// The session contains:
/// - `interactive`: whether standard input is a terminal; controls prompting.
/// - `pgid` / `saved_modes`: the process group that owns the terminal and the
///   terminal modes captured when it was claimed (interactive sessions only).
/// - `line_number`: the counter shown in the prompt.
/// - `home`: the directory `cd` falls back to when called without a target.
/// - `should_exit`: set by `quit`; the loop checks it after every command.
pub struct Session {
    pub interactive: bool,
    pub pgid: Option<Pid>,
    pub saved_modes: Option<Termios>,
    pub line_number: usize,
    pub home: Option<PathBuf>,
    pub should_exit: bool,
}

impl Session {
    /// Capture the process state and, when attached to a terminal, make this
    /// shell the foreground process group.
    pub fn init() -> Self {
        let mut session = Self::detached();
        session.interactive = io::stdin().is_terminal();
        if session.interactive {
            match claim_terminal() {
                Ok((pgid, modes)) => {
                    debug!(pgid = pgid.as_raw(), "claimed controlling terminal");
                    session.pgid = Some(pgid);
                    session.saved_modes = Some(modes);
                }
                Err(e) => warn!("failed to claim controlling terminal: {}", e),
            }
        }
        session
    }

    /// A non-interactive session that never touches the terminal.
    pub fn detached() -> Self {
        Self {
            interactive: false,
            pgid: None,
            saved_modes: None,
            line_number: 0,
            home: stdenv::var_os("HOME").map(PathBuf::from),
            should_exit: false,
        }
    }

    /// Prompt for the next line, or `None` when not interactive.
    pub fn prompt(&self) -> Option<String> {
        self.interactive.then(|| format!("{}: ", self.line_number))
    }

    /// Put back the terminal modes saved at startup.
    ///
    /// Called after a foreground child exits; a no-op for non-interactive sessions.
    pub fn restore_terminal(&self) {
        let Some(modes) = &self.saved_modes else {
            return;
        };
        if let Err(e) = tcsetattr(io::stdin(), SetArg::TCSADRAIN, modes) {
            debug!("failed to restore terminal modes: {}", e);
        }
    }
}

fn claim_terminal() -> nix::Result<(Pid, Termios)> {
    let terminal = io::stdin();

    // Stop ourselves until the job-control shell that started us moves us to the foreground.
    loop {
        let pgid = getpgrp();
        if tcgetpgrp(&terminal)? == pgid {
            break;
        }
        kill(Pid::from_raw(-pgid.as_raw()), Signal::SIGTTIN)?;
    }

    let pgid = getpid();
    if let Err(e) = setpgid(pgid, pgid) {
        // EPERM when we already lead a session; the terminal can still be claimed.
        debug!("setpgid failed: {}", e);
    }
    tcsetpgrp(&terminal, pgid)?;
    let modes = tcgetattr(&terminal)?;
    Ok((pgid, modes))
}
