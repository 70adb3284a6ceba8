pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shopmate",
    about = "Shopmate operator CLI",
    long_about = "Operate the shopmate advisor: migrations, demo catalog seeding, config \
                  inspection, and one-shot advice queries.",
    after_help = "Examples:\n  shopmate migrate\n  shopmate seed\n  shopmate config show\n  shopmate ask \"I need a neck massager\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo product catalog into the database")]
    Seed,
    #[command(about = "Inspect or validate the effective configuration")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(about = "Run one advise pass and print the streamed reply")]
    Ask {
        #[arg(required = true, help = "The shopping query, e.g. \"I need a neck massager\"")]
        query: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    #[command(about = "Print effective configuration values with secrets redacted")]
    Show,
    #[command(about = "Validate configuration and report the first problem found")]
    Validate,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config { action } => match action {
            ConfigAction::Show => {
                commands::CommandResult { exit_code: 0, output: commands::config::show() }
            }
            ConfigAction::Validate => commands::config::validate(),
        },
        Command::Ask { query } => commands::ask::run(&query.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
