use std::io::{self, Write};

use crate::shell::commands::builtin::BUILTIN_NAMES;
use crate::shell::context::ShellContext;
use crate::shell::lookup::executables_with_prefix;

/// Tab-completion state machine.
///
/// Implements the two-press disambiguation behavior: a first Tab on an
/// ambiguous prefix that cannot be advanced remembers it (the caller rings
/// the bell), a second Tab on the same prefix lists every candidate.
#[derive(Debug, Default)]
pub struct Completion {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    prefix: String,
    matches: Vec<String>,
}

impl Completion {
    /// Forget any pending double-press state. Called on every non-Tab edit.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Attempt completion on `buffer`. Returns true when the terminal line
    /// needs a redraw (the buffer was mutated, or candidates were printed).
    pub fn complete(
        &mut self,
        buffer: &mut String,
        ctx: &ShellContext,
        out: &mut dyn Write,
    ) -> io::Result<bool> {
        let prefix = buffer.clone();

        // Only the first token is completable.
        if prefix.contains(' ') {
            self.reset();
            return Ok(false);
        }

        // Builtin keywords complete immediately; first match wins.
        for keyword in BUILTIN_NAMES {
            if keyword.starts_with(&prefix) && prefix != *keyword {
                buffer.clear();
                buffer.push_str(keyword);
                buffer.push(' ');
                self.reset();
                return Ok(true);
            }
        }

        let matches = executables_with_prefix(ctx, &prefix);
        if matches.is_empty() {
            self.reset();
            return Ok(false);
        }
        if let [only] = matches.as_slice() {
            buffer.clear();
            buffer.push_str(only);
            buffer.push(' ');
            self.reset();
            return Ok(true);
        }

        let lcp = longest_common_prefix(&matches);
        if lcp.len() > prefix.len() {
            // Partial completion; no trailing space so another Tab can
            // disambiguate further.
            buffer.clear();
            buffer.push_str(&lcp);
            self.reset();
            return Ok(true);
        }

        if let Some(pending) = &self.pending {
            if pending.prefix == prefix {
                writeln!(out)?;
                writeln!(out, "{}", pending.matches.join("  "))?;
                self.reset();
                return Ok(true);
            }
        }
        self.pending = Some(Pending { prefix, matches });
        Ok(false)
    }
}

fn longest_common_prefix(strings: &[String]) -> String {
    let mut prefix = strings[0].clone();
    for s in &strings[1..] {
        let common = prefix
            .chars()
            .zip(s.chars())
            .take_while(|(a, b)| a == b)
            .count();
        prefix = prefix.chars().take(common).collect();
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}
