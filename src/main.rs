use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use tracereview::cli::{Cli, Command};
use tracereview::{TraceError, export, record, server, status};

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".tracereview").join("traces.db")
}

fn run() -> Result<(), TraceError> {
    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_db_path);

    match cli.command {
        Command::Serve(args) => server::handle_serve(&db_path, args.bind.as_deref()),
        Command::Record => record::handle_record(&db_path),
        Command::Export(args) => export::handle_export(&db_path, &args),
        Command::Status => status::handle_status(&db_path),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tracereview: {e}");
            ExitCode::from(1)
        }
    }
}
