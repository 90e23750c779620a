//! A tiny line-oriented command shell.
//!
//! Each input line is split on whitespace. If the first word names a builtin
//! (`?`, `quit`, `pwd`, `cd`) it runs inside the shell process; otherwise the line
//! is launched as a program in a forked child, tried first as a literal path and
//! then under every PATH directory, with optional `< file` / `> file` redirection.
//!
//! The main entry point is [`Interpreter`], which owns the [`Session`] and runs
//! lines read from a [`LineSource`].

mod builtin;
pub mod command;
pub mod config;
mod external;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod redirect;
pub mod session;

pub use builtin::Builtin;
pub use external::{ExternalCommand, LaunchError, candidate_paths};
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
pub use io_adapters::LineSource;
pub use session::Session;
