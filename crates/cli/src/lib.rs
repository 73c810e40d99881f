pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shoprec",
    about = "Shoprec operator CLI",
    long_about = "Operate the shoprec recommendation store: migrations, demo data, config \
                  inspection, bearer tokens and one-off recommendation requests.",
    after_help = "Examples:\n  shoprec migrate\n  shoprec seed\n  shoprec token user-ada\n  \
                  shoprec recommend user-ada"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog and interaction history")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Resolve recommendations for one user, retraining when the cache is stale")]
    Recommend {
        #[arg(help = "User id to resolve recommendations for")]
        user_id: String,
    },
    #[command(about = "Issue a bearer token accepted by GET /recommendations/{user_id}")]
    Token {
        #[arg(help = "User id the token is scoped to")]
        user_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Recommend { user_id } => commands::recommend::run(&user_id),
        Command::Token { user_id } => commands::token::run(&user_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
