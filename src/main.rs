//! `toolconf` - configuration manager for cooperating tool components

use clap::Parser;

use toolconf::cli::args::Cli;
use toolconf::cli::commands;
use toolconf::error::ExitCode;
use toolconf::observability::init_logging;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format(), cli.verbosity(), cli.color);
    }

    match commands::dispatch(cli).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
