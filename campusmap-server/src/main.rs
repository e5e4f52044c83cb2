//! Entry point for the `campusmap` binary.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use campusmap_server::CliError;

fn main() -> ExitCode {
    match campusmap_server::run() {
        Ok(()) => ExitCode::SUCCESS,
        // Help and version requests exit 0 through clap.
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("campusmap: {err}");
            ExitCode::FAILURE
        }
    }
}
