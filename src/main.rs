//! Care Home Backend - binary entry point
//! Delegates to the library for all app logic.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match carehome_backend::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal startup error");
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
