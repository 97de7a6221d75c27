use crate::options::sub_command::Commands;
use clap::Parser;

/// Command-line front end for the pagewatch change detection and versioning engine.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Build main sub commands
    #[clap(subcommand)]
    pub command: Commands,
    /// Register a competitor (`<id> <url>`) before running the command, if it
    /// doesn't already exist in the store.
    #[clap(long, num_args = 2, value_names = ["ID", "URL"])]
    pub register: Option<Vec<String>>,
    /// Path to a sqlite database file; omit to use the in-memory store.
    #[clap(long)]
    pub sqlite: Option<String>,
    /// Base URL of the renderer service (ignored by `capture --simulate-file`).
    #[clap(long)]
    pub renderer_base_url: Option<String>,
    /// Bearer token for the renderer service.
    #[clap(long)]
    pub renderer_token: Option<String>,
    /// Print verbose logs.
    #[clap(short, long)]
    pub verbose: bool,
}
