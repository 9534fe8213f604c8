//! tileview - plan the visible tiles of a large image.
//!
//! Opens an image, places a viewport over it and keeps re-planning as
//! decoded tiles arrive, then prints the final draw plan.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tileview::{CacheStats, Config, DrawPlan, ImageSource, ScreenRect, TileViewer};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    run(config).await
}

/// Initialize the tracing subscriber.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tileview=debug"
    } else {
        "tileview=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Draw Loop
// =============================================================================

async fn run(config: Config) -> ExitCode {
    let options = config.loader_options();
    info!(
        "Tile cache {} MB, {} decode tasks",
        options.cache_capacity_kb / 1024,
        options.max_tasks
    );

    let redraw = Arc::new(Notify::new());
    let notifier = redraw.clone();
    let mut viewer = TileViewer::new(Handle::current(), options)
        .with_tile_available(Arc::new(move || notifier.notify_one()));

    if let Err(e) = viewer.attach_source(ImageSource::from_path(&config.image)) {
        error!("Failed to open {}: {}", config.image.display(), e);
        return ExitCode::FAILURE;
    }

    viewer.on_viewport_resized(config.viewport.width, config.viewport.height);
    if let Some((x, y)) = config.pan() {
        viewer.set_pan(x, y);
    }
    if let Some(zoom) = config.zoom {
        viewer.set_zoom(zoom);
    }

    let mut plan = DrawPlan::default();
    for attempt in 1..=config.attempts {
        let Some(next) = viewer.plan() else {
            error!("Viewport is not ready to draw");
            return ExitCode::FAILURE;
        };
        plan = next;

        debug!(
            attempt,
            visible = plan.len(),
            missing = plan.missing_count(),
            "planned draw"
        );
        if plan.is_complete() {
            break;
        }

        // Permits from notify_one survive until the next wait, so a tile
        // finishing between plan() and here is not missed
        if tokio::time::timeout(config.wait_timeout(), redraw.notified())
            .await
            .is_err()
        {
            warn!(attempt, "No tile arrived within {:?}", config.wait_timeout());
        }
    }

    let report = PlanReport::new(&config, &viewer, &plan);
    if config.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize plan: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_table(&report);
    }

    if plan.is_complete() {
        ExitCode::SUCCESS
    } else {
        warn!(
            "{} of {} visible tiles still missing after {} attempts",
            plan.missing_count(),
            plan.len(),
            config.attempts
        );
        ExitCode::FAILURE
    }
}

// =============================================================================
// Output
// =============================================================================

#[derive(Debug, Serialize)]
struct PlanReport {
    image: String,
    image_width: u32,
    image_height: u32,
    viewport_width: u32,
    viewport_height: u32,
    pan_x: Option<f64>,
    pan_y: Option<f64>,
    zoom: f64,
    sample_size: u32,
    complete: bool,
    tiles: Vec<TileRow>,
    cache: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
struct TileRow {
    origin_x: u32,
    origin_y: u32,
    downsample: u32,
    loaded: bool,
    width: Option<u32>,
    height: Option<u32>,
    dest: ScreenRect,
}

impl PlanReport {
    fn new(config: &Config, viewer: &TileViewer<ImageSource>, plan: &DrawPlan) -> Self {
        let viewport = viewer.viewport();
        let (image_width, image_height) = viewport.image_size().unwrap_or_default();
        let (viewport_width, viewport_height) = viewport.viewport_size();
        let pan = viewport.pan_center();

        let tiles = plan
            .items
            .iter()
            .map(|item| TileRow {
                origin_x: item.key.origin_x,
                origin_y: item.key.origin_y,
                downsample: item.key.downsample,
                loaded: item.tile.is_some(),
                width: item.tile.as_ref().map(|tile| tile.width()),
                height: item.tile.as_ref().map(|tile| tile.height()),
                dest: item.dest,
            })
            .collect();

        Self {
            image: config.image.display().to_string(),
            image_width,
            image_height,
            viewport_width,
            viewport_height,
            pan_x: pan.map(|p| p.x),
            pan_y: pan.map(|p| p.y),
            zoom: viewport.zoom(),
            sample_size: plan.sample_size,
            complete: plan.is_complete(),
            tiles,
            cache: viewer.cache_stats(),
        }
    }
}

fn print_table(report: &PlanReport) {
    println!("Image:    {} ({}x{})", report.image, report.image_width, report.image_height);
    println!(
        "Viewport: {}x{}  zoom {:.4}  sample size {}",
        report.viewport_width, report.viewport_height, report.zoom, report.sample_size
    );
    if let (Some(x), Some(y)) = (report.pan_x, report.pan_y) {
        println!("Pan:      ({:.1}, {:.1})", x, y);
    }
    println!();
    println!(
        "{:>8} {:>8} {:>4}  {:>9}  {:>10} {:>10} {:>10} {:>10}",
        "x", "y", "s", "size", "left", "top", "right", "bottom"
    );
    for tile in &report.tiles {
        let size = match (tile.width, tile.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => "-".to_string(),
        };
        println!(
            "{:>8} {:>8} {:>4}  {:>9}  {:>10.1} {:>10.1} {:>10.1} {:>10.1}",
            tile.origin_x,
            tile.origin_y,
            tile.downsample,
            size,
            tile.dest.left,
            tile.dest.top,
            tile.dest.right,
            tile.dest.bottom
        );
    }
    println!();

    let loaded = report.tiles.iter().filter(|tile| tile.loaded).count();
    println!("Tiles:    {}/{} loaded", loaded, report.tiles.len());
    if let Some(cache) = report.cache {
        println!(
            "Cache:    {} entries, {:.1}/{:.1} MB",
            cache.entries,
            cache.occupied_bytes as f64 / (1024.0 * 1024.0),
            cache.capacity_bytes as f64 / (1024.0 * 1024.0)
        );
    }
}
