use argh::FromArgs;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the default log filter.
pub const LOG_ENV: &str = "MINISHELL_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(FromArgs, Debug)]
/// A small command shell: runs builtins in-process and other commands as child programs.
pub struct Config {
    #[argh(option)]
    /// tracing filter directive, e.g. `debug` or `minishell=trace`; overrides $MINISHELL_LOG.
    pub log: Option<String>,

    #[argh(option)]
    /// file to load interactive history from and save it to on exit.
    pub history: Option<PathBuf>,
}

impl Config {
    /// The filter to install: the flag, then the environment, then `warn`.
    pub fn log_filter(&self) -> EnvFilter {
        if let Some(directive) = &self.log {
            if let Ok(filter) = EnvFilter::try_new(directive) {
                return filter;
            }
        }
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }

    /// Installs the global subscriber. Logs go to stderr so they never mix with command output.
    pub fn init_logging(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();
    }
}
