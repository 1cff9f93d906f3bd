//! `maplayer fetch` - pull one tile through the cache pipeline.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use serde_json::json;
use tracing::info;

use maplayer::coord::TileCoord;
use maplayer::provider::TileStatus;
use maplayer::services::{SharedServices, SharedServicesConfig};
use maplayer::overlay::TileOverlayRegistry;

use super::CommandResult;

/// How long to wait for the tile to arrive before giving up.
const FETCH_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Args)]
pub struct FetchArgs {
    /// Tile URL template with {x}, {y} and {z} placeholders.
    #[arg(long)]
    pub template: String,

    /// Zoom level.
    #[arg(short = 'z', long)]
    pub zoom: u8,

    /// Tile column.
    #[arg(short = 'x', long)]
    pub x: u32,

    /// Tile row.
    #[arg(short = 'y', long)]
    pub y: u32,

    /// Output file (defaults to tile_{z}_{x}_{y}.png).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Disk cache directory (defaults to the platform cache dir).
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Disable the disk cache tier.
    #[arg(long)]
    pub no_disk_cache: bool,
}

pub async fn run(args: FetchArgs) -> CommandResult {
    let services = SharedServices::new(SharedServicesConfig::default())?;
    let registry = TileOverlayRegistry::new(services.clone(), args.cache_dir.clone()).await;

    let added = registry.add_overlays(&[json!({
        "id": "cli",
        "tileProvider": {"urlTemplate": args.template},
        "diskCacheEnabled": !args.no_disk_cache,
        "preloadMargin": 0,
        "minZoom": 0,
        "maxZoom": 30,
    })]);
    let overlay = added
        .first()
        .and_then(|id| registry.get(id))
        .ok_or("overlay could not be built from the given template")?;

    let coord = TileCoord::new(args.x, args.y, args.zoom);
    let provider = overlay.provider();
    let started = Instant::now();

    let bytes = loop {
        match provider.tile(coord) {
            TileStatus::Ready(bytes) => break bytes,
            TileStatus::OutOfRange => return Err(format!("tile {coord} is out of range").into()),
            TileStatus::Pending => {
                if started.elapsed() > FETCH_DEADLINE {
                    return Err(format!("timed out fetching tile {coord}").into());
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    };

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("tile_{}_{}_{}.png", args.zoom, args.x, args.y)));
    tokio::fs::write(&out, &bytes).await?;

    info!(tile = %coord, bytes = bytes.len(), out = %out.display(), "tile written");
    println!("{} ({} bytes) -> {}", coord, bytes.len(), out.display());
    println!("{}", services.metrics().snapshot());

    services.shutdown();
    Ok(())
}
