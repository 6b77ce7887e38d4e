use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tracereview", version, about = "Review and annotate recorded chatbot traces")]
pub struct Cli {
    /// Database path
    #[arg(long, env = "TRACEREVIEW_DB", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the review web UI
    Serve(ServeArgs),
    /// Record one trace read as JSON from stdin
    Record,
    /// Write traces or the error-analysis sheet as CSV
    Export(ExportArgs),
    /// Show database health: size, trace counts, top failure modes
    Status,
}

#[derive(Parser)]
pub struct ServeArgs {
    /// Listen address (overrides [server].bind in config)
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Parser)]
pub struct ExportArgs {
    /// Export the one-hot failure-mode sheet instead of raw traces
    #[arg(long)]
    pub error_analysis: bool,

    /// Output file (default: stdout)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}
