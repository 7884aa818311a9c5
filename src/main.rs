//! Binary entry point: parse arguments, set up logging and signal handling,
//! run the command, translate the outcome into a process exit code.

use clap::Parser;

use clonereaper::cli::{self, Cli};
use clonereaper::error::ExitCode;
use clonereaper::logging;
use clonereaper::signal;

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let shutdown = match signal::install_handler() {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!(
                "[{}] Could not install signal handler: {e}",
                ExitCode::GeneralError.code_prefix()
            );
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    };

    let code = match cli::run(cli, &shutdown) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[{}] Error: {e:#}", ExitCode::GeneralError.code_prefix());
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}
