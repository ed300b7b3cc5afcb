//! Runbook: view and execute declarative operational runbooks.
//!
//! This is the main entry point for the `runbook` CLI. It parses arguments,
//! loads the configuration, installs logging and the Ctrl-C handler, dispatches
//! to the appropriate command handler, and handles errors with proper exit
//! codes.

use runbook::cancel::CancelToken;
use runbook::cli::Cli;
use runbook::error::RunbookError;
use runbook::{commands, exit_codes, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), RunbookError> {
    let config = commands::load_config(cli.config.as_deref())?;
    logging::init(&config.log_filter);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling");
        handler_token.cancel();
    })
    .map_err(|e| RunbookError::UserError(format!("failed to install Ctrl-C handler: {}", e)))?;

    commands::dispatch(cli.command, &config, &cancel)
}
