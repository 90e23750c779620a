use crate::session::Session;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

pub const SUCCESS: ExitCode = 0;
pub const FAILURE: ExitCode = 1;

/// Object-safe trait for any command that can be executed by the shell.
///
/// Implemented by the wrapper every builtin is dispatched through and by [`ExternalCommand`].
///
/// [`ExternalCommand`]: crate::ExternalCommand
pub trait ExecutableCommand {
    /// Executes the command.
    ///
    /// `stdout` receives anything the shell itself prints on behalf of the command
    /// (built-in output, diagnostics). External programs write to the inherited
    /// descriptors instead.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode>;
}
