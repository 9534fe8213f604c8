//! Tile layer.
//!
//! This module provides the decoded-tile cache and the asynchronous loader
//! that fills it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Draw Planner               │
//! └────────────────────┬────────────────────┘
//!                      │ request_tile()
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileLoader                 │
//! │  ┌─────────────────────────────────┐    │
//! │  │ one mutex:                      │    │
//! │  │   TileCache  (byte-bounded LRU) │    │
//! │  │   in-flight set                 │    │
//! │  └─────────────────────────────────┘    │
//! │        │ spawn_blocking (≤ max_tasks)   │
//! │        ▼                                │
//! │  ┌─────────────────────────────────┐    │
//! │  │ TileTask: decode → put → notify │    │
//! │  └─────────────────────────────────┘    │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              DecoderPool                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileKey`]: tile origin and downsample level
//! - [`Tile`]: decoded RGBA pixels of one tile
//! - [`TileCache`]: LRU cache bounded by total byte footprint
//! - [`TileLoader`]: in-flight tracking and the decode worker pool
//! - [`memory_ceiling_bytes`] / [`cache_capacity_kb`]: cache sizing
//!
//! # Example
//!
//! ```
//! use tileview::tile::{Tile, TileCache, TileKey};
//!
//! let mut cache = TileCache::with_capacity_kb(4 * 1024);
//!
//! let key = TileKey::new(0, 0, 1);
//! let tile = Tile::new(vec![0u8; 512 * 512 * 4], 512, 512);
//!
//! cache.put(key, tile.clone());
//! assert_eq!(cache.get(&key), Some(tile));
//! ```

mod budget;
mod cache;
mod loader;

pub use budget::{
    cache_capacity_kb, default_cache_capacity_kb, memory_ceiling_bytes, DEFAULT_CACHE_FRACTION,
};
pub use cache::{Tile, TileCache, TileKey};
pub use loader::{
    default_max_tasks, CacheStats, TileAvailableCallback, TileLoader, TileLoaderOptions,
    TileRequestOutcome,
};

/// Edge length of a tile in sampled pixels.
pub const TILE_SIZE: u32 = 512;
