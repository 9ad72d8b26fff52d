pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::report::ReportKind;

#[derive(Debug, Parser)]
#[command(
    name = "tantrata",
    about = "Tantrata sales analytics CLI",
    long_about = "Prepare the sales database, load demo history, and print analytics reports.",
    after_help = "Examples:\n  tantrata migrate\n  tantrata seed\n  tantrata report dashboard --json\n  tantrata doctor"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo sales history and verify it")]
    Seed,
    #[command(about = "Run an analytics report over the recorded sales history")]
    Report {
        #[arg(value_enum, default_value_t = ReportKind::Dashboard)]
        kind: ReportKind,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Validate config, database connectivity, and schema migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Report { kind, json } => commands::report::run(kind, json),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
