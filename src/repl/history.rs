use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Ordered, append-only log of submitted lines plus the Up/Down navigation
/// cursor.
///
/// Browsing state is volatile: adding an entry leaves the store in the
/// not-browsing state. Duplicate consecutive lines are kept.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    cursor: Option<usize>,
    limit: Option<usize>,
    // Entries below this index have already been persisted.
    appended_up_to: usize,
}

impl History {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn add(&mut self, line: &str) {
        self.entries.push(line.to_string());
        self.cursor = None;
        if let Some(limit) = self.limit {
            while self.entries.len() > limit {
                self.entries.remove(0);
                self.appended_up_to = self.appended_up_to.saturating_sub(1);
            }
        }
    }

    /// Step toward older entries. Returns the entry now under the cursor,
    /// or `None` when already at the oldest entry.
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = match self.cursor {
            None => Some(self.entries.len() - 1),
            Some(0) => return None,
            Some(i) => Some(i - 1),
        };
        self.cursor.map(|i| self.entries[i].as_str())
    }

    /// Step toward newer entries. Advancing past the newest entry returns
    /// `None` and leaves the store in the not-browsing state, so a further
    /// recall restarts at the newest entry.
    pub fn next_entry(&mut self) -> Option<&str> {
        let i = self.cursor?;
        if i + 1 >= self.entries.len() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(i + 1);
        Some(self.entries[i + 1].as_str())
    }

    pub fn print_all(&self, out: &mut dyn Write) -> Result<()> {
        self.print_last(out, self.entries.len())
    }

    pub fn print_last(&self, out: &mut dyn Write, n: usize) -> Result<()> {
        let start = self.entries.len().saturating_sub(n);
        for (i, entry) in self.entries.iter().enumerate().skip(start) {
            writeln!(out, "{:5}  {}", i + 1, entry)?;
        }
        Ok(())
    }

    /// Merge entries from a history file (one line each). Loaded entries
    /// count as already persisted.
    pub fn read_from(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        self.entries
            .extend(content.lines().filter(|l| !l.is_empty()).map(String::from));
        self.appended_up_to = self.entries.len();
        self.cursor = None;
        Ok(())
    }

    /// Write the whole history, replacing the file's contents.
    pub fn write_to(&mut self, path: &Path) -> Result<()> {
        let mut content = self.entries.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
        self.appended_up_to = self.entries.len();
        Ok(())
    }

    /// Append entries newer than the last persisted one.
    pub fn append_to(&mut self, path: &Path) -> Result<()> {
        let new = &self.entries[self.appended_up_to..];
        if new.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        for line in new {
            writeln!(file, "{line}")?;
        }
        self.appended_up_to = self.entries.len();
        Ok(())
    }
}
