use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use dga_eval::{report, utils, Args, Config};

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    let config = Config::from_args(&args);
    info!(action = "configure", component = "main", config = ?config, "Resolved configuration");

    match dga_eval::evaluate(&config) {
        Ok(report) => {
            report::print_summary(&report);
            Ok(())
        }
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
