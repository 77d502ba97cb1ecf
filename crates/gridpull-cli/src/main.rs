use clap::Parser;
use gridpull_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Initialize logging as early as possible; fall back to stderr if the
    // state dir is unwritable.
    let verbosity = cli.verbosity();
    if logging::init_logging(verbosity.as_deref()).is_err() {
        logging::init_logging_stderr(verbosity.as_deref());
    }

    if let Err(err) = cli.execute() {
        tracing::error!("run failed: {:#}", err);
        eprintln!("gridpull error: {:#}", err);
        std::process::exit(1);
    }
}
