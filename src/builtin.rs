use crate::command::{ExecutableCommand, ExitCode, FAILURE, SUCCESS};
use crate::session::Session;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process, so they can change the shell's
/// own working directory or end the session.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Executes the command, writing its output to `stdout`.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode>;
}

/// Every builtin ever dispatched goes through this wrapper: errors are reported
/// to the user and turned into a failure code.
struct Invocation<T>(T);

impl<T: BuiltinCommand> ExecutableCommand for Invocation<T> {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        match self.0.execute(stdout, session) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{:#}", e)?;
                Ok(FAILURE)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _session: &mut Session,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(if self.is_error { FAILURE } else { SUCCESS })
    }
}

/// The closed set of builtins, in the order `?` lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Help,
    Quit,
    Pwd,
    Cd,
}

impl Builtin {
    pub const ALL: [Builtin; 4] = [Builtin::Help, Builtin::Quit, Builtin::Pwd, Builtin::Cd];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Help => "?",
            Builtin::Quit => "quit",
            Builtin::Pwd => "pwd",
            Builtin::Cd => "cd",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Builtin::Help => "show this help menu",
            Builtin::Quit => "quit the command shell",
            Builtin::Pwd => "print the current working directory",
            Builtin::Cd => "change the current working directory",
        }
    }

    /// Finds the builtin registered under exactly `name` (case-sensitive).
    ///
    /// `None` as input (an empty line has no command word) never matches.
    pub fn lookup(name: Option<&str>) -> Option<Builtin> {
        let name = name?;
        Builtin::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Parses `args` (the tokens after the command word) into a runnable command.
    pub fn create(self, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match self {
            Builtin::Help => parse::<Help>(self.name(), args),
            Builtin::Quit => parse::<Quit>(self.name(), args),
            Builtin::Pwd => parse::<Pwd>(self.name(), args),
            Builtin::Cd => parse::<Cd>(self.name(), args),
        }
    }
}

fn parse<T: BuiltinCommand + 'static>(name: &str, args: &[&str]) -> Box<dyn ExecutableCommand> {
    // Builtin arguments are plain words: `cd -x` names a directory, `pwd -L` is ignored.
    let argv: Vec<&str> = std::iter::once("--").chain(args.iter().copied()).collect();
    match T::from_args(&[name], &argv) {
        Ok(cmd) => Box::new(Invocation(cmd)),
        Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
            output,
            is_error: status.is_err(),
        }),
    }
}

#[derive(FromArgs)]
/// List the builtin commands with a short description.
pub struct Help {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Help {
    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        for builtin in Builtin::ALL {
            writeln!(stdout, "{} - {}", builtin.name(), builtin.description())?;
        }
        Ok(SUCCESS)
    }
}

#[derive(FromArgs)]
/// Quit the shell with exit code 0.
pub struct Quit {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Quit {
    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        debug!("quit requested");
        session.should_exit = true;
        Ok(SUCCESS)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Pwd {
    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        print_working_dir(stdout);
        Ok(SUCCESS)
    }
}

/// Best effort: neither a failing `getcwd` nor a failing write changes the outcome.
fn print_working_dir(stdout: &mut dyn Write) {
    match env::current_dir() {
        Ok(dir) => {
            if let Err(e) = writeln!(stdout, "{}", dir.display()) {
                debug!("pwd: cannot write working directory: {}", e);
            }
        }
        Err(e) => debug!("pwd: cannot read working directory: {}", e),
    }
}

#[derive(FromArgs)]
/// Change the current working directory and print the new one.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to, absolute or relative; any further words are ignored.
    pub args: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let target = match self.args.first() {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => session
                .home
                .clone()
                .context("cd: no target and HOME not set")?,
        };

        env::set_current_dir(&target)
            .with_context(|| format!("cd: can't chdir to {}", target.display()))?;
        debug!(target = %target.display(), "changed directory");

        print_working_dir(stdout);
        Ok(SUCCESS)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run(builtin: Builtin, args: &[&str], session: &mut Session) -> (ExitCode, String) {
        let mut out = Vec::new();
        let code = builtin.create(args).execute(&mut out, session).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_lookup_exact_names() {
        assert_eq!(Builtin::lookup(Some("?")), Some(Builtin::Help));
        assert_eq!(Builtin::lookup(Some("quit")), Some(Builtin::Quit));
        assert_eq!(Builtin::lookup(Some("pwd")), Some(Builtin::Pwd));
        assert_eq!(Builtin::lookup(Some("cd")), Some(Builtin::Cd));
    }

    #[test]
    fn test_lookup_is_case_sensitive_and_exact() {
        for name in ["Quit", "PWD", "Cd", "cd ", "c", "quitter", "", "help", "ls"] {
            assert_eq!(Builtin::lookup(Some(name)), None, "{:?} must not match", name);
        }
        assert_eq!(Builtin::lookup(None), None);
    }

    #[test]
    fn test_help_lists_every_builtin() {
        let mut session = Session::detached();
        let (code, out) = run(Builtin::Help, &[], &mut session);
        assert_eq!(code, SUCCESS);
        assert_eq!(
            out,
            "? - show this help menu\n\
             quit - quit the command shell\n\
             pwd - print the current working directory\n\
             cd - change the current working directory\n"
        );
    }

    #[test]
    fn test_quit_marks_session_for_exit() {
        let mut session = Session::detached();
        let (code, out) = run(Builtin::Quit, &["whatever", "args"], &mut session);
        assert_eq!(code, SUCCESS);
        assert!(out.is_empty());
        assert!(session.should_exit);
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let _lock = lock_current_dir();
        let cur = env::current_dir().unwrap();

        let mut session = Session::detached();
        let (code, out) = run(Builtin::Pwd, &[], &mut session);

        assert_eq!(code, SUCCESS);
        assert_eq!(out, format!("{}\n", cur.display()));
    }

    #[test]
    fn test_pwd_ignores_arguments() {
        let _lock = lock_current_dir();
        let cur = env::current_dir().unwrap();

        let mut session = Session::detached();
        let (code, out) = run(Builtin::Pwd, &["extra", "-L", "--help"], &mut session);

        assert_eq!(code, SUCCESS);
        assert_eq!(out, format!("{}\n", cur.display()));
    }

    #[test]
    fn test_help_ignores_arguments() {
        let mut session = Session::detached();
        let (plain_code, plain) = run(Builtin::Help, &[], &mut session);
        let (code, out) = run(Builtin::Help, &["extra", "--help"], &mut session);
        assert_eq!(plain_code, SUCCESS);
        assert_eq!(code, SUCCESS);
        assert_eq!(out, plain);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pwd_write_failure_still_succeeds() {
        let mut session = Session::detached();
        let code = Builtin::Pwd
            .create(&[])
            .execute(&mut FailingWriter, &mut session)
            .unwrap();
        assert_eq!(code, SUCCESS);
    }

    #[test]
    fn test_cd_to_existing_dir_changes_and_echoes() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();

        let mut session = Session::detached();
        let target = canonical.to_string_lossy().to_string();
        let (code, out) = run(Builtin::Cd, &[&target], &mut session);
        let now = env::current_dir().unwrap();
        env::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, SUCCESS);
        assert_eq!(fs::canonicalize(now).unwrap(), canonical);
        assert_eq!(out, format!("{}\n", canonical.display()));
    }

    #[test]
    fn test_cd_relative_path() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        env::set_current_dir(temp.path()).unwrap();

        let mut session = Session::detached();
        let (code, _) = run(Builtin::Cd, &["sub"], &mut session);
        let now = env::current_dir().unwrap();
        env::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, SUCCESS);
        assert!(now.ends_with("sub"), "cwd is {:?}", now);
    }

    #[test]
    fn test_cd_nonexistent_path_fails_and_keeps_cwd() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();

        let mut session = Session::detached();
        let name = format!("nonexistent_dir_for_cd_test_{}", std::process::id());
        let (code, out) = run(Builtin::Cd, &[&name], &mut session);

        assert_eq!(code, FAILURE);
        assert!(out.starts_with("cd: can't chdir to"), "unexpected output: {}", out);
        assert!(out.contains(&name));
        assert_eq!(env::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_without_target_goes_home() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();

        let mut session = Session::detached();
        session.home = Some(canonical.clone());
        let (code, _) = run(Builtin::Cd, &[], &mut session);
        let now = env::current_dir().unwrap();
        env::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, SUCCESS);
        assert_eq!(fs::canonicalize(now).unwrap(), canonical);
    }

    #[test]
    fn test_cd_without_target_and_home_fails() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();

        let mut session = Session::detached();
        session.home = None;
        let (code, out) = run(Builtin::Cd, &[], &mut session);

        assert_eq!(code, FAILURE);
        assert!(out.contains("HOME not set"), "unexpected output: {}", out);
        assert_eq!(env::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_uses_first_argument_and_ignores_the_rest() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();

        let mut session = Session::detached();
        let target = canonical.to_string_lossy().to_string();
        let (code, out) = run(Builtin::Cd, &[&target, "/", "extra"], &mut session);
        let now = env::current_dir().unwrap();
        env::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, SUCCESS);
        assert_eq!(fs::canonicalize(now).unwrap(), canonical);
        assert_eq!(out, format!("{}\n", canonical.display()));
    }

    #[test]
    fn test_cd_into_dash_prefixed_dir() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical.join("-dash")).unwrap();
        env::set_current_dir(&canonical).unwrap();

        let mut session = Session::detached();
        let (code, out) = run(Builtin::Cd, &["-dash"], &mut session);
        let now = env::current_dir().unwrap();
        env::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, SUCCESS, "unexpected output: {}", out);
        assert_eq!(fs::canonicalize(now).unwrap(), canonical.join("-dash"));
    }
}
