use anyhow::Result;
use minishell::config::Config;
use minishell::io_adapters::{BufReadSource, EditorSource};
use minishell::{Interpreter, LineSource, Session};
use std::io;

fn main() -> Result<()> {
    let config: Config = argh::from_env();
    config.init_logging();

    let session = Session::init();
    let mut input: Box<dyn LineSource> = if session.interactive {
        Box::new(EditorSource::new(config.history.clone())?)
    } else {
        Box::new(BufReadSource::new(io::stdin().lock()))
    };

    let mut sh = Interpreter::new(session);
    let code = sh.run(input.as_mut(), &mut io::stdout())?;
    std::process::exit(code)
}
