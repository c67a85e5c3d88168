pub mod ast;
pub mod commands;
pub mod context;
pub mod executor;
pub mod lookup;
pub mod parser;


use std::sync::Mutex;

use anyhow::Result;

use crate::repl::history::History;
use context::ShellContext;
use executor::Outcome;

/// Parse and execute one command line against the session context, with
/// the shell's own standard streams.
pub fn run_command_line(
    line: &str,
    ctx: &mut ShellContext,
    history: &Mutex<History>,
) -> Result<Outcome> {
    let pipeline = parser::parse_command_line(line);
    executor::run_pipeline(&pipeline, ctx, history, None, None)
}
