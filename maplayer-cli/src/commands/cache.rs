//! `maplayer cache` - inspect or clear the disk tile cache.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use maplayer::cache::DiskCache;

use super::CommandResult;

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,

    /// Disk cache directory (defaults to the platform cache dir).
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Print entry count and total size of the disk cache.
    Stats,
    /// Delete every entry in the disk cache.
    Clear,
}

pub async fn run(args: CacheArgs) -> CommandResult {
    let root = DiskCache::resolve_root(args.cache_dir)
        .ok_or("no cache directory configured and no platform cache dir available")?;
    // The budget is irrelevant for stats/clear; nothing is inserted here.
    let cache = DiskCache::open(root, u64::MAX).await?;

    match args.command {
        CacheCommand::Stats => {
            println!("directory: {}", cache.root().display());
            println!("entries:   {}", cache.entry_count());
            println!(
                "size:      {:.1} MiB",
                cache.size_bytes() as f64 / (1024.0 * 1024.0)
            );
        }
        CacheCommand::Clear => {
            let entries = cache.entry_count();
            cache.clear().await?;
            println!("cleared {} entries from {}", entries, cache.root().display());
        }
    }
    Ok(())
}
