mod cli;
mod config;
mod repl;
mod shell;

use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::Cli;
use repl::Repl;
use repl::history::History;
use shell::context::ShellContext;

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    let ctx = ShellContext::new();
    let config = match config::load_config(cli.config.as_deref(), &ctx) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e:#}", "mish:".yellow());
            config::ShellConfig::default()
        }
    };

    if let Some(line) = cli.command {
        return run_once(&line, ctx);
    }

    repl::term::install_signal_restore()?;
    let mut repl = Repl::new(&config, ctx, !cli.no_history);
    repl.run()
}

fn run_once(line: &str, mut ctx: ShellContext) -> Result<ExitCode> {
    let history = Mutex::new(History::new(None));
    let outcome = shell::run_command_line(line, &mut ctx, &history)?;
    Ok(repl::to_exit_code(outcome.exit.unwrap_or(outcome.status)))
}
