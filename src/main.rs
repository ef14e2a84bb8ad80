// sgrep-lint - rule-driven front-end for the sgrep matcher
// Main CLI entry point

use clap::Parser;
use std::process;
use sgrep_lint::cli::{Cli, CliDispatcher};
use sgrep_lint::utils::error::UserError;
use sgrep_lint::utils::logger::init_cli_logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_cli_logger(cli.verbose, cli.quiet);

    match CliDispatcher::execute(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(err) => {
            let user_error = UserError::from_lint_error(&err);
            user_error.print();
            process::exit(user_error.exit_code);
        }
    }
}
