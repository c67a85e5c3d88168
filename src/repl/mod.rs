pub mod complete;
pub mod editor;
pub mod history;
pub mod keys;
pub mod term;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Result;
use colored::Colorize;
use log::{debug, warn};

use crate::config::ShellConfig;
use crate::shell;
use crate::shell::context::ShellContext;
use crate::shell::executor::Outcome;
use editor::LineEditor;
use history::History;
use term::RawModeGuard;

/// The outermost read-eval loop: obtains a line from the editor, parses
/// it, and hands the result to the pipeline coordinator.
pub struct Repl {
    ctx: ShellContext,
    history: Mutex<History>,
    editor: LineEditor,
    history_file: Option<PathBuf>,
}

impl Repl {
    pub fn new(config: &ShellConfig, ctx: ShellContext, persist_history: bool) -> Self {
        let mut history = History::new(config.history_limit());
        let history_file = if persist_history {
            config.history_file(&ctx)
        } else {
            None
        };
        if let Some(path) = &history_file {
            if path.exists() {
                if let Err(e) = history.read_from(path) {
                    warn!("could not load history: {e:#}");
                }
            }
        }

        Self {
            editor: LineEditor::new(config.prompt()),
            ctx,
            history: Mutex::new(history),
            history_file,
        }
    }

    /// Run until `exit` or end of input. No error from parsing or
    /// execution terminates the loop; each is printed and the next prompt
    /// follows.
    pub fn run(&mut self) -> Result<ExitCode> {
        loop {
            let line = match self.read_one_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    eprintln!("{} {e:#}", "mish:".red());
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            self.history
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .add(&line);

            match shell::run_command_line(&line, &mut self.ctx, &self.history) {
                Ok(Outcome {
                    exit: Some(code), ..
                }) => {
                    self.persist_history();
                    return Ok(to_exit_code(code));
                }
                Ok(_) => {}
                Err(e) => eprintln!("{} {e:#}", "mish:".red()),
            }
        }

        self.persist_history();
        Ok(to_exit_code(self.ctx.exit_code))
    }

    // Raw mode is scoped to exactly one editor call, so pipelines run with
    // the terminal back in its original state.
    fn read_one_line(&mut self) -> Result<Option<String>> {
        let _raw = match RawModeGuard::enable() {
            Ok(guard) => Some(guard),
            Err(e) => {
                // Non-terminal stdin (scripts, tests): read cooked input.
                debug!("raw mode unavailable: {e:#}");
                None
            }
        };
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let mut input = io::stdin().lock();
        let mut output = io::stdout().lock();
        self.editor
            .read_line(&mut input, &mut output, &mut history, &self.ctx)
    }

    fn persist_history(&self) {
        let Some(path) = &self.history_file else {
            return;
        };
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = history.append_to(path) {
            warn!("could not save history: {e:#}");
        }
    }
}

pub fn to_exit_code(status: i32) -> ExitCode {
    ExitCode::from((status & 0xff) as u8)
}
