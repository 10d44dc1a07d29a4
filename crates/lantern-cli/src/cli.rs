//! CLI definitions for lantern.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "lantern",
    version,
    about = "Run lantern scripts under an interactive debugger",
    after_help = "Examples:
  lantern run job.ls --break 12
  lantern run job.ls --stop-on-entry --session .lantern-session.json
  lantern check job.ls"
)]
pub struct Cli {
    /// Show debug-level logs.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a script with the debugger attached.
    Run(RunArgs),
    /// Parse a script and report syntax errors.
    Check {
        /// Script file.
        script: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Script file to run.
    pub script: PathBuf,
    /// Library scripts whose functions the main script may call.
    #[arg(long = "lib", value_name = "PATH")]
    pub libs: Vec<PathBuf>,
    /// Debugger configuration file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Session file to restore from and save to.
    #[arg(long)]
    pub session: Option<PathBuf>,
    /// Breakpoint line in the main script; repeatable.
    #[arg(long = "break", short = 'b', value_name = "LINE")]
    pub breakpoints: Vec<u32>,
    /// Stop before the first statement.
    #[arg(long, action = ArgAction::SetTrue)]
    pub stop_on_entry: bool,
    /// Variable tree depth shown at each stop.
    #[arg(long)]
    pub depth: Option<usize>,
    /// Run without the debugger.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_debug: bool,
}
