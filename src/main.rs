use std::process::ExitCode;

use clap::Parser;
use maskpaint::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Initialize session log (overwrites previous session log)
    logger::init(args.verbose);
    tracing::info!("maskpaint {} starting", env!("CARGO_PKG_VERSION"));
    if let Some(path) = logger::log_path() {
        tracing::debug!("log file: {}", path.display());
    }

    cli::run(args)
}
