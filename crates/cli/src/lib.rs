pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "kiosk",
    about = "Kiosk operator CLI",
    long_about = "Operate the storefront bot: database migrations, readiness checks, and order export.",
    after_help = "Examples:\n  kiosk migrate\n  kiosk doctor --json\n  kiosk export"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config and database connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Render the full order store as a tabular report")]
    Export,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Export => commands::export::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
