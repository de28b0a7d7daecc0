//! skillmap - Manifest builder and integrity checker for skill corpora

use std::process::ExitCode;

fn main() -> ExitCode {
    match skillmap::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
