use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "mish", version, about = "Mish: Minimalist Interactive Shell")]
pub struct Cli {
    /// Run a single command line and exit with its status
    #[arg(short = 'c', long = "command", value_name = "LINE")]
    pub command: Option<String>,

    /// Use an alternate rc file instead of ~/.mish.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Do not load or persist command history
    #[arg(long)]
    pub no_history: bool,
}
