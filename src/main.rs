use std::process::ExitCode;

use clap::Parser;

use hypollm::commands::{self, Command};
use hypollm::logger::{self, LogLevel};

#[derive(Parser)]
#[command(
    name = "hypollm",
    version,
    about = "Suggest, write, review and repair hypothesis property-based tests with an LLM."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let common = cli.command.common();
    logger::init(LogLevel::from_flags(common.quiet, common.verbose));

    match commands::run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", commands::describe_failure(&e));
            ExitCode::FAILURE
        }
    }
}
