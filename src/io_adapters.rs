use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::debug;

/// Where the dispatch loop gets its next line from.
pub trait LineSource {
    /// Returns the next line without its terminator, or `None` at end-of-input.
    ///
    /// `prompt` is shown only by sources attached to a terminal.
    fn read_line(&mut self, prompt: Option<&str>) -> Result<Option<String>>;

    /// Called once when the session ends.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Line editor for interactive sessions, with optional persistent history.
pub struct EditorSource {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl EditorSource {
    pub fn new(history: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;
        if let Some(path) = &history {
            if let Err(e) = editor.load_history(path) {
                debug!("no history loaded from {}: {}", path.display(), e);
            }
        }
        Ok(Self { editor, history })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: Option<&str>) -> Result<Option<String>> {
        match self.editor.readline(prompt.unwrap_or("")) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the line being typed, not the session.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e).context("failed to read line"),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(path) = &self.history {
            self.editor
                .save_history(path)
                .with_context(|| format!("failed to save history to {}", path.display()))?;
        }
        Ok(())
    }
}

/// Raw line reader used when input is not a terminal: no prompt, no editing.
///
/// Lines are read as bytes. Invalid UTF-8 is replaced rather than ending the session.
pub struct BufReadSource<R> {
    reader: R,
}

impl<R: BufRead> BufReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for BufReadSource<R> {
    fn read_line(&mut self, _prompt: Option<&str>) -> Result<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let mut line = String::from_utf8_lossy(&buf).into_owned();
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}
