mod app;
mod cli;
mod config;
mod db;
mod http;
mod logging;
mod model;
mod paths;

use anyhow::Result;
use clap::Parser;

use crate::logging::LogTarget;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    if cli.launches_tui() {
        let log_path = paths::log_file_path()?;
        logging::init_logging(cli.verbose, LogTarget::File(&log_path))?;
    } else {
        logging::init_logging(cli.verbose, LogTarget::Stderr)?;
    }
    app::run(cli)
}
