//! projscan CLI entry point.

use clap::Parser;
use projscan::cli::{self, Cli, EXIT_ERROR};
use projscan::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    let exit_code = match cli::run_scan(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
