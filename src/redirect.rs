//! Detection and application of `<` / `>` redirections.
//!
//! Stripping happens on the token list and is pure; applying opens the target
//! files and rebinds descriptor 0 or 1. Applying is only ever done inside a
//! freshly forked child, so the shell's own descriptors are left alone.

use nix::libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::dup2;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Permission bits for files created by `>`: read/write for owner and group.
pub const OUTPUT_MODE: u32 = 0o660;

/// Kind of redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `< file`: standard input reads from the file.
    Input,
    /// `> file`: standard output is written to the (truncated) file.
    Output,
}

impl RedirectKind {
    /// Recognises a standalone redirection operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(RedirectKind::Input),
            ">" => Some(RedirectKind::Output),
            _ => None,
        }
    }

    /// The descriptor this redirection rebinds.
    pub fn target_fd(self) -> RawFd {
        match self {
            RedirectKind::Input => STDIN_FILENO,
            RedirectKind::Output => STDOUT_FILENO,
        }
    }
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("cannot open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot rebind descriptor {fd}: {source}")]
    Rebind { fd: RawFd, source: nix::Error },
}

/// A single `operator file` pair found on a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub kind: RedirectKind,
    pub target: PathBuf,
}

impl Redirection {
    pub fn new(kind: RedirectKind, target: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }

    /// Opens the target file the way this redirection needs it.
    pub fn open(&self) -> Result<File, RedirectError> {
        open_target(self.kind, &self.target).map_err(|source| RedirectError::Open {
            path: self.target.clone(),
            source,
        })
    }

    /// Opens the target and rebinds the matching standard descriptor to it.
    pub fn apply(&self) -> Result<(), RedirectError> {
        let file = self.open()?;
        let fd = self.kind.target_fd();
        dup2(file.as_raw_fd(), fd).map_err(|source| RedirectError::Rebind { fd, source })?;
        Ok(())
    }
}

fn open_target(kind: RedirectKind, path: &Path) -> io::Result<File> {
    match kind {
        RedirectKind::Input => File::open(path),
        RedirectKind::Output => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(OUTPUT_MODE)
            .open(path),
    }
}

/// Removes redirections from `args` and returns them in the order they appear.
///
/// Everything from the first operator onward is not an argument of the program:
/// operators, their filenames and any stray words after them are all dropped.
/// An operator without a following token is ignored.
pub fn strip_redirections(args: &mut Vec<String>) -> Vec<Redirection> {
    let Some(first) = args
        .iter()
        .position(|token| RedirectKind::from_token(token).is_some())
    else {
        return Vec::new();
    };

    let tail = &args[first..];
    let redirections = tail
        .iter()
        .enumerate()
        .filter_map(|(i, token)| {
            let kind = RedirectKind::from_token(token)?;
            let target = tail.get(i + 1)?;
            Some(Redirection::new(kind, target))
        })
        .collect();

    args.truncate(first);
    redirections
}

/// Applies every redirection in order.
///
/// Failures are not surfaced: the descriptor stays bound to whatever it was
/// and the command runs with its default I/O.
pub fn apply_all(redirections: &[Redirection]) {
    for redirection in redirections {
        if let Err(e) = redirection.apply() {
            debug!("redirection ignored: {}", e);
        }
    }
}
