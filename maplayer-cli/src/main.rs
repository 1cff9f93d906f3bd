//! MapLayer CLI - command-line interface
//!
//! Exercises the MapLayer engine outside a host application: fetch single
//! tiles through the full cache pipeline and inspect or clear the disk
//! cache.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "maplayer", version, about = "Tile overlay engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one tile through the cache pipeline and write it to a file.
    Fetch(commands::fetch::FetchArgs),
    /// Inspect or clear the disk tile cache.
    Cache(commands::cache::CacheArgs),
}

#[tokio::main]
async fn main() {
    maplayer::telemetry::init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Fetch(args) => commands::fetch::run(args).await,
        Command::Cache(args) => commands::cache::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
