use anyhow::{bail, Context};
use clap::Parser;
use osm_imagery::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

/// Fetches one tile and its four children from an OpenStreetMap tile server
#[derive(Parser, Debug)]
#[command(name = "osm-imagery-app")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with provider options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Delay before asking again for a deferred tile
    #[arg(long, default_value_t = 250)]
    retry_delay_ms: u64,

    /// How many times a deferred tile is asked for again
    #[arg(long, default_value_t = 20)]
    max_retries: u32,

    level: u32,
    x: u32,
    y: u32,
}

/// Requests a tile, asking again after `delay` while the server is saturated
async fn fetch_with_retry(
    provider: &OpenStreetMapImageryProvider,
    coord: TileCoord,
    delay: Duration,
    max_retries: u32,
) -> anyhow::Result<RequestOutcome> {
    for attempt in 0..=max_retries {
        let outcome = provider
            .request_image(coord.x, coord.y, coord.level)
            .await
            .with_context(|| format!("requesting tile {}", coord))?;

        if !outcome.is_deferred() {
            return Ok(outcome);
        }
        log::debug!("tile {} deferred (attempt {})", coord, attempt + 1);
        tokio::time::sleep(delay).await;
    }
    bail!("tile {} still deferred after {} retries", coord, max_retries)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let options = match &args.options {
        Some(path) => ProviderOptions::from_json_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => ProviderOptions::default(),
    };
    let provider = OpenStreetMapImageryProvider::new(options)?;

    let root = TileCoord::new(args.x, args.y, args.level);
    if !root.is_valid() {
        bail!("tile {} does not exist", root);
    }
    let mut coords = vec![root];
    coords.extend((0..4u32).map(|i| {
        TileCoord::new(root.x * 2 + i % 2, root.y * 2 + i / 2, root.level + 1)
    }));

    let delay = Duration::from_millis(args.retry_delay_ms);
    let outcomes = futures::future::join_all(
        coords
            .iter()
            .map(|&coord| fetch_with_retry(&provider, coord, delay, args.max_retries)),
    )
    .await;

    println!("credit: {}", provider.credit());
    for (coord, outcome) in coords.iter().zip(outcomes) {
        match outcome {
            Ok(RequestOutcome::Delivered(tile)) => println!(
                "{} {} -> {}x{}",
                coord,
                provider.tile_url(coord.x, coord.y, coord.level),
                tile.width(),
                tile.height()
            ),
            Ok(RequestOutcome::Failed(reason)) => println!("{} failed: {}", coord, reason),
            Ok(RequestOutcome::Deferred) => println!("{} deferred", coord),
            Err(e) => println!("{} error: {:#}", coord, e),
        }
    }

    Ok(())
}
