//! brokerkb CLI - run and inspect case sync from the terminal

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{CaseCommands, Cli, Commands};
use crate::commands::case::{run_case_export, run_case_list, run_case_show, run_case_sync};
use crate::commands::common::resolve_db_path;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "brokerkb_cli=warn".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Sync { json } => run_sync(json, &db_path).await?,
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Case { command } => match command {
            CaseCommands::Sync { id } => run_case_sync(&id, &db_path).await?,
            CaseCommands::Show { id, json } => run_case_show(&id, json, &db_path).await?,
            CaseCommands::List { limit, state, json } => {
                run_case_list(limit, state, json, &db_path).await?;
            }
            CaseCommands::Export { id, output } => {
                run_case_export(&id, output.as_deref(), &db_path).await?;
            }
        },
    }

    Ok(())
}
