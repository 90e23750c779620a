use crate::builtin::Builtin;
use crate::command::{ExecutableCommand, ExitCode, SUCCESS};
use crate::external::ExternalCommand;
use crate::io_adapters::LineSource;
use crate::lexer;
use crate::session::Session;
use std::env;
use std::io::Write;
use tracing::{debug, warn};

/// A minimal shell that runs built-in and external commands line by line.
///
/// The interpreter owns the [`Session`]. Each line is tokenized, its first word
/// is looked up among the builtins, and anything else is launched as a program.
///
/// Example
/// ```
/// use minishell::{Interpreter, Session};
/// let mut sh = Interpreter::new(Session::detached());
/// let mut out = Vec::new();
/// let code = sh.execute_line("?", &mut out).unwrap();
/// assert_eq!(code, 0);
/// assert!(String::from_utf8(out).unwrap().starts_with("? - "));
/// ```
pub struct Interpreter {
    session: Session,
}

impl Interpreter {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run a single input line.
    ///
    /// Returns the command's exit code, or an error if it could not be started.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let tokens = lexer::split_into_tokens(line);
        let Some(name) = tokens.first() else {
            return Ok(SUCCESS);
        };

        let command: Box<dyn ExecutableCommand> = match Builtin::lookup(Some(name.as_str())) {
            Some(builtin) => {
                let args: Vec<&str> = tokens[1..].iter().map(String::as_str).collect();
                builtin.create(&args)
            }
            None => Box::new(ExternalCommand::new(tokens, env::var_os("PATH"))),
        };
        command.execute(stdout, &mut self.session)
    }

    /// Read-eval loop: runs until end-of-input or `quit`.
    ///
    /// A failing command never ends the session; its error is printed and the
    /// next line is read. Returns the shell's exit code.
    pub fn repl(
        &mut self,
        input: &mut dyn LineSource,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        loop {
            let prompt = self.session.prompt();
            let Some(line) = input.read_line(prompt.as_deref())? else {
                debug!("end of input");
                return Ok(SUCCESS);
            };

            match self.execute_line(&line, stdout) {
                Ok(code) => debug!(line = self.session.line_number, code, "command finished"),
                Err(e) => writeln!(stdout, "{:#}", e)?,
            }
            if self.session.should_exit {
                return Ok(SUCCESS);
            }
            self.session.line_number += 1;
        }
    }

    /// Runs the loop over `input`, then closes it.
    ///
    /// Closing only persists editor state, so a failure there is logged and
    /// the loop's exit code is returned unchanged.
    pub fn run(
        &mut self,
        input: &mut dyn LineSource,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let code = self.repl(input, stdout)?;
        if let Err(e) = input.close() {
            warn!("{:#}", e);
        }
        Ok(code)
    }
}
