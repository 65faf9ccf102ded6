use clap::Parser;
use colored::Colorize;
use dotenvy::dotenv;
use tracing::info;

mod bridge;
mod cli;
mod commands;
mod config;
mod llm;
mod session;
mod utils;

use cli::{Cli, Command};
use config::Config;
use session::Session;
use utils::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", format!("Configuration error: {err:#}").red());
            std::process::exit(2);
        }
    };
    let _guards = init_logging(&config.log_level);
    info!("Starting nanobanana");

    let session = Session::new(config);
    let result = match cli.command {
        Command::Generate(args) => commands::generate(&session, args).await,
        Command::Models(args) => commands::models(&session, args).await,
        Command::Rewrite(args) => commands::rewrite(args),
    };

    if let Err(err) = result {
        eprintln!("{}", format!("Error: {err:#}").red());
        std::process::exit(1);
    }
}
