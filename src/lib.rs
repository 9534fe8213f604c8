//! # tileview
//!
//! A tile cache and viewport transform engine for very large raster images.
//!
//! Instead of decoding a whole map into memory, the engine decodes only the
//! tiles a viewport can see, at the resolution the current zoom calls for,
//! and keeps recently used tiles in a memory-bounded cache.
//!
//! ## Features
//!
//! - **Byte-bounded LRU cache**: Evicts by total decoded footprint, sized from the process memory ceiling
//! - **Deduplicated decoding**: At most one decode per tile at a time, with worker-pool backpressure
//! - **Resolution levels**: Power-of-two downsampling picked from the zoom scale
//! - **Exact transforms**: Screen and image mappings that are inverses of one another
//!
//! ## Architecture
//!
//! - [`source`] - Region decoders and the per-worker decoder pool
//! - [`tile`] - Tile keys, the tile cache and the asynchronous tile loader
//! - [`viewport`] - Pan/zoom state, zoom limits and coordinate transforms
//! - [`planner`] - Which tiles to draw, and where
//! - [`overlay`] - Markers pinned to image points
//! - [`viewer`] - The facade an owning view drives
//! - [`config`] - CLI configuration for the `tileview` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tileview::{ImageSource, TileLoaderOptions, TileViewer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut viewer = TileViewer::new(tokio::runtime::Handle::current(), TileLoaderOptions::detect())
//!         .with_tile_available(Arc::new(|| println!("redraw")));
//!
//!     viewer.attach_source(ImageSource::from_path("map.png")).unwrap();
//!     viewer.on_viewport_resized(1280, 720);
//!     viewer.on_zoom_gesture(640.0, 360.0, 2.0);
//!
//!     if let Some(plan) = viewer.plan() {
//!         for item in &plan.items {
//!             println!("{:?} -> {:?} loaded={}", item.key, item.dest, item.tile.is_some());
//!         }
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod overlay;
pub mod planner;
pub mod source;
mod sync;
pub mod tile;
pub mod viewer;
pub mod viewport;

// Re-export commonly used types
pub use config::{Config, ViewportSize};
pub use error::{ConfigError, DecodeError, SourceError};
pub use overlay::{OverlayAnchor, OverlayId, OverlaySet, PlacedOverlay};
pub use planner::{plan, DrawItem, DrawPlan, TileProvider};
pub use source::{
    DecoderLease, DecoderPool, DecoderSource, ImageRegionDecoder, ImageSource, PixelRegion,
    RegionDecoder,
};
pub use tile::{
    cache_capacity_kb, default_max_tasks, memory_ceiling_bytes, CacheStats, Tile,
    TileAvailableCallback, TileCache, TileKey, TileLoader, TileLoaderOptions, TileRequestOutcome,
    DEFAULT_CACHE_FRACTION, TILE_SIZE,
};
pub use viewer::{ImagePoint, TileViewer};
pub use viewport::{
    calculate_sample_size, ScreenRect, ViewState, Viewport, ViewportState, ZoomLimits,
    MAX_SAMPLE_SIZE,
};
