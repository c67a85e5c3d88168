use std::io::{Read, Write};

use anyhow::Result;

use crate::repl::complete::Completion;
use crate::repl::history::History;
use crate::repl::keys::{KeyAction, read_action};
use crate::shell::context::ShellContext;

const BELL: &str = "\x07";
const ERASE_LAST: &str = "\x08 \x08";
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Raw-terminal line editor.
///
/// Owns the line buffer for the duration of one `read_line` call and
/// drives completion and history recall. Editing is append/remove at the
/// tail only; there is no mid-line cursor movement.
pub struct LineEditor {
    prompt: String,
    buffer: String,
    completion: Completion,
}

impl LineEditor {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            buffer: String::new(),
            completion: Completion::default(),
        }
    }

    /// Read one line. Returns `None` when the input stream is exhausted,
    /// which ends the shell loop cleanly.
    pub fn read_line(
        &mut self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        history: &mut History,
        ctx: &ShellContext,
    ) -> Result<Option<String>> {
        self.buffer.clear();
        write!(output, "{}", self.prompt)?;
        output.flush()?;

        loop {
            let Some(action) = read_action(input)? else {
                writeln!(output)?;
                return Ok(None);
            };
            match action {
                KeyAction::Insert(c) => {
                    self.buffer.push(c);
                    write!(output, "{c}")?;
                    output.flush()?;
                    self.completion.reset();
                }
                KeyAction::Backspace => {
                    if !self.buffer.is_empty() {
                        self.buffer.pop();
                        write!(output, "{ERASE_LAST}")?;
                        output.flush()?;
                        self.completion.reset();
                    }
                }
                KeyAction::Tab => {
                    if self.completion.complete(&mut self.buffer, ctx, output)? {
                        self.redraw(output)?;
                    } else {
                        self.bell(output)?;
                    }
                }
                KeyAction::HistoryUp => {
                    let entry = history.previous().map(str::to_owned);
                    self.recall(entry, output)?;
                }
                KeyAction::HistoryDown => {
                    let entry = history.next_entry().map(str::to_owned);
                    self.recall(entry, output)?;
                }
                KeyAction::Enter => {
                    writeln!(output)?;
                    output.flush()?;
                    self.completion.reset();
                    return Ok(Some(self.buffer.trim().to_string()));
                }
                KeyAction::Ignore => self.bell(output)?,
            }
        }
    }

    fn recall(&mut self, entry: Option<String>, output: &mut dyn Write) -> Result<()> {
        match entry {
            Some(text) => {
                self.buffer.clear();
                self.buffer.push_str(&text);
                self.redraw(output)?;
                self.completion.reset();
            }
            None => self.bell(output)?,
        }
        Ok(())
    }

    fn redraw(&self, output: &mut dyn Write) -> Result<()> {
        write!(output, "{CLEAR_LINE}{}{}", self.prompt, self.buffer)?;
        output.flush()?;
        Ok(())
    }

    fn bell(&self, output: &mut dyn Write) -> Result<()> {
        write!(output, "{BELL}")?;
        output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_one(
        bytes: &[u8],
        history: &mut History,
        ctx: &ShellContext,
    ) -> (Option<String>, String) {
        let mut editor = LineEditor::new("$ ");
        let mut input = Cursor::new(bytes.to_vec());
        let mut output = Vec::new();
        let line = editor
            .read_line(&mut input, &mut output, history, ctx)
            .unwrap();
        (line, String::from_utf8_lossy(&output).into_owned())
    }

    fn bare_ctx() -> ShellContext {
        let mut ctx = ShellContext::new();
        ctx.env.remove("PATH");
        ctx
    }

    #[test]
    fn submits_on_enter() {
        let mut history = History::new(None);
        let (line, output) = read_one(b"ls -l\r", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some("ls -l"));
        assert!(output.starts_with("$ "));
        assert!(output.contains("ls -l"));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let mut history = History::new(None);
        let (line, _) = read_one(b"  hi  \n", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some("hi"));
    }

    #[test]
    fn backspace_removes_the_tail_character() {
        let mut history = History::new(None);
        let (line, output) = read_one(b"lsx\x7f\r", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some("ls"));
        assert!(output.contains("\x08 \x08"));
    }

    #[test]
    fn backspace_on_empty_buffer_does_nothing() {
        let mut history = History::new(None);
        let (line, output) = read_one(b"\x7fok\r", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some("ok"));
        assert!(!output.contains("\x08 \x08"));
    }

    #[test]
    fn end_of_input_returns_none() {
        let mut history = History::new(None);
        let (line, _) = read_one(b"", &mut history, &bare_ctx());
        assert_eq!(line, None);
    }

    #[test]
    fn up_arrow_recalls_the_previous_entry() {
        let mut history = History::new(None);
        history.add("pwd");
        let (line, output) = read_one(b"\x1b[A\r", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some("pwd"));
        // The recalled entry is redrawn after a full line clear.
        assert!(output.contains("\r\x1b[2K$ pwd"));
    }

    #[test]
    fn typed_text_is_replaced_by_the_recalled_entry() {
        let mut history = History::new(None);
        history.add("echo old");
        let (line, _) = read_one(b"junk\x1b[A\r", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some("echo old"));
    }

    #[test]
    fn down_arrow_with_nothing_to_recall_bells() {
        let mut history = History::new(None);
        let (line, output) = read_one(b"\x1b[B\r", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some(""));
        assert!(output.contains('\x07'));
    }

    #[test]
    fn unknown_control_byte_bells() {
        let mut history = History::new(None);
        let (_, output) = read_one(&[1, b'\r'], &mut history, &bare_ctx());
        assert!(output.contains('\x07'));
    }

    #[test]
    fn tab_with_no_candidates_bells() {
        let mut history = History::new(None);
        let (line, output) = read_one(b"zzq\t\r", &mut history, &bare_ctx());
        assert_eq!(line.as_deref(), Some("zzq"));
        assert!(output.contains('\x07'));
    }

    #[test]
    fn tab_completes_a_builtin_keyword() {
        let mut history = History::new(None);
        let (line, output) = read_one(b"ec\t\r", &mut history, &bare_ctx());
        // The completed buffer ends with a trailing space, trimmed on submit.
        assert_eq!(line.as_deref(), Some("echo"));
        assert!(output.contains("\r\x1b[2K$ echo "));
    }

    #[cfg(unix)]
    #[test]
    fn tab_completes_an_executable_from_path() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("mish_editor_tab_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let exe = dir.join("zqhello");
        fs::write(&exe, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        let mut ctx = bare_ctx();
        ctx.env
            .insert("PATH".into(), dir.to_string_lossy().into_owned());

        let mut history = History::new(None);
        let (line, _) = read_one(b"zqh\t\r", &mut history, &ctx);
        assert_eq!(line.as_deref(), Some("zqhello"));

        fs::remove_dir_all(dir).unwrap();
    }
}
