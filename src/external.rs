use crate::command::{ExecutableCommand, ExitCode, FAILURE, SUCCESS};
use crate::redirect::{self, Redirection};
use crate::session::Session;
use anyhow::Result;
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, execv, fork};
use std::ffi::{CString, NulError, OsStr, OsString};
use std::io::{self, Write};
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Exit status of a child that found nothing to execute.
pub const NOT_FOUND: ExitCode = 127;
/// Exit status of a child whose program exists but could not be executed.
pub const NOT_EXECUTABLE: ExitCode = 126;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("argument contains a NUL byte: {0}")]
    Nul(#[from] NulError),
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),
}

/// Command that is not a builtin.
///
/// The first token is the program (a path or a bare name), the rest are its
/// arguments, possibly followed by `<` / `>` redirections.
pub struct ExternalCommand {
    tokens: Vec<String>,
    search_paths: Option<OsString>,
}

impl ExternalCommand {
    /// `search_paths` is the value of PATH used when the program name does not
    /// work as a path by itself.
    pub fn new(tokens: Vec<String>, search_paths: Option<OsString>) -> Self {
        Self {
            tokens,
            search_paths,
        }
    }

    /// Resolves everything that needs allocating before the fork.
    fn plan(mut self) -> Result<LaunchPlan, LaunchError> {
        let redirections = redirect::strip_redirections(&mut self.tokens);
        let argv = self
            .tokens
            .iter()
            .map(|t| CString::new(t.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let candidates = match self.tokens.first() {
            Some(program) => candidate_paths(program, self.search_paths.as_deref())
                .into_iter()
                .map(|p| CString::new(p.into_os_string().into_vec()))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(LaunchPlan {
            argv,
            candidates,
            redirections,
        })
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        let plan = self.plan()?;

        // Anything still buffered would otherwise be written twice, once per process.
        stdout.flush()?;
        io::stdout().flush()?;

        // SAFETY: the shell is single-threaded, and the child only opens files,
        // duplicates descriptors and calls exec before exiting.
        match unsafe { fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => plan.exec(),
            ForkResult::Parent { child } => {
                debug!(pid = child.as_raw(), argv = ?plan.argv, "spawned child");
                let status = waitpid(child, None);
                session.restore_terminal();
                report_wait(status, stdout)
            }
        }
    }
}

/// Turns the outcome of waiting for a child into the command's exit code.
/// A failed wait is reported on `stdout` and counts as a failure.
fn report_wait(status: nix::Result<WaitStatus>, stdout: &mut dyn Write) -> Result<ExitCode> {
    match status {
        Ok(status) => {
            debug!(?status, "child finished");
            Ok(exit_code(status))
        }
        Err(e) => {
            writeln!(stdout, "waitpid() error: {}", e)?;
            Ok(FAILURE)
        }
    }
}

struct LaunchPlan {
    argv: Vec<CString>,
    candidates: Vec<CString>,
    redirections: Vec<Redirection>,
}

impl LaunchPlan {
    /// Runs in the child: never returns to shell code.
    fn exec(mut self) -> ! {
        redirect::apply_all(&self.redirections);

        if self.argv.is_empty() {
            // Nothing but redirections on the line; the files have been created.
            std::process::exit(SUCCESS);
        }

        let program = self.argv[0].to_string_lossy().into_owned();
        let mut denied = false;
        for candidate in self.candidates {
            self.argv[0] = candidate;
            let errno = execv(&self.argv[0], &self.argv).unwrap_err();
            debug!(candidate = ?self.argv[0], %errno, "exec failed");
            denied |= errno == Errno::EACCES;
        }

        if denied {
            eprintln!("{}: permission denied", program);
            std::process::exit(NOT_EXECUTABLE);
        }
        eprintln!("{}: command not found", program);
        std::process::exit(NOT_FOUND)
    }
}

/// Paths to try, in order, when executing `program`.
///
/// The name is first tried as given (relative to the working directory unless
/// absolute), then appended to each non-empty PATH entry as `dir/program`.
pub fn candidate_paths(program: &str, search_paths: Option<&OsStr>) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(program)];
    let Some(search_paths) = search_paths else {
        return candidates;
    };
    for dir in std::env::split_paths(search_paths) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let mut candidate = dir.into_os_string();
        candidate.push("/");
        candidate.push(program);
        candidates.push(PathBuf::from(candidate));
    }
    candidates
}

/// Maps a wait status to a shell-style exit code.
pub fn exit_code(status: WaitStatus) -> ExitCode {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => -1,
    }
}
