//! Tile cache for decoded tiles.
//!
//! This module provides an LRU cache for decoded tiles so the same region
//! is not decoded again while it stays in view.
//!
//! # Cache Key
//!
//! Tiles are cached by:
//! - Origin X in full-resolution pixels
//! - Origin Y in full-resolution pixels
//! - Downsample level (sample size)
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total byte footprint of cached tiles and evicts
//! least-recently-used entries until a new tile fits. Recency is updated on
//! every `get` and `put`.
//!
//! A tile larger than the whole capacity is rejected and logged instead of
//! emptying the cache for it, so occupied bytes never exceed capacity.

use bytes::Bytes;
use image::RgbaImage;
use lru::LruCache;
use tracing::{debug, warn};

use crate::source::PixelRegion;

use super::TILE_SIZE;

// =============================================================================
// Tile Key
// =============================================================================

/// Cache key for decoded tiles.
///
/// `origin_x` and `origin_y` are full-resolution pixel coordinates and are
/// multiples of `TILE_SIZE * downsample` for keys produced by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Left edge in full-resolution pixels
    pub origin_x: u32,

    /// Top edge in full-resolution pixels
    pub origin_y: u32,

    /// Downsample factor (1 = full resolution)
    pub downsample: u32,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(origin_x: u32, origin_y: u32, downsample: u32) -> Self {
        Self {
            origin_x,
            origin_y,
            downsample,
        }
    }

    /// Full-resolution region this tile covers, clipped to the image.
    ///
    /// Returns `None` if the origin lies outside `[0, width) × [0, height)`.
    pub fn region(&self, image_width: u32, image_height: u32) -> Option<PixelRegion> {
        if self.origin_x >= image_width || self.origin_y >= image_height {
            return None;
        }

        let extent = self.downsample.max(1).saturating_mul(TILE_SIZE);
        Some(PixelRegion::new(
            self.origin_x,
            self.origin_y,
            image_width.min(self.origin_x.saturating_add(extent)),
            image_height.min(self.origin_y.saturating_add(extent)),
        ))
    }
}

// =============================================================================
// Tile
// =============================================================================

/// Decoded RGBA8 pixels of one tile.
///
/// Cloning is cheap: the pixel buffer is reference counted, so the planner
/// can hand tiles to the renderer while the cache keeps owning them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pixels: Bytes,
    width: u32,
    height: u32,
}

impl Tile {
    /// Create a tile from raw pixel bytes.
    pub fn new(pixels: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self {
            pixels: pixels.into(),
            width,
            height,
        }
    }

    /// Create a tile from a decoded image buffer.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte footprint used for cache accounting.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// A tile with no pixels is never cached.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// LRU cache for decoded tiles with a byte-size capacity.
///
/// The cache itself is not synchronized. [`TileLoader`](super::TileLoader)
/// keeps it behind the same mutex as its in-flight set.
pub struct TileCache {
    /// The underlying LRU cache
    cache: LruCache<TileKey, Tile>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: usize,
}

impl TileCache {
    /// Create a cache holding at most `max_size` bytes of tiles.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            cache: LruCache::unbounded(),
            max_size,
            current_size: 0,
        }
    }

    /// Create a cache holding at most `capacity_kb` kilobytes of tiles.
    pub fn with_capacity_kb(capacity_kb: usize) -> Self {
        Self::with_capacity(capacity_kb.saturating_mul(1024))
    }

    /// Byte footprint of `tile` for cache accounting.
    pub fn size_of(tile: &Tile) -> usize {
        tile.byte_size()
    }

    /// Get a tile and mark it as most recently used.
    pub fn get(&mut self, key: &TileKey) -> Option<Tile> {
        self.cache.get(key).cloned()
    }

    /// Check if a tile is cached without updating LRU order.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.cache.contains(key)
    }

    /// Store a tile, evicting least-recently-used entries until it fits.
    ///
    /// Returns `true` if the tile was stored. Empty tiles and tiles larger
    /// than the whole capacity are logged and dropped.
    pub fn put(&mut self, key: TileKey, tile: Tile) -> bool {
        if tile.is_empty() {
            warn!(?key, "refusing to cache empty tile");
            return false;
        }

        let size = Self::size_of(&tile);
        if size > self.max_size {
            warn!(
                ?key,
                size,
                capacity = self.max_size,
                "tile larger than cache capacity, not cached"
            );
            return false;
        }

        // Replacing an entry frees its old footprint first
        if let Some(old) = self.cache.pop(&key) {
            self.current_size = self.current_size.saturating_sub(Self::size_of(&old));
        }

        while self.current_size + size > self.max_size {
            match self.cache.pop_lru() {
                Some((evicted_key, evicted)) => {
                    self.current_size = self.current_size.saturating_sub(Self::size_of(&evicted));
                    debug!(key = ?evicted_key, "evicted tile");
                }
                None => break,
            }
        }

        debug!(?key, size, "caching tile");
        self.cache.put(key, tile);
        self.current_size += size;
        true
    }

    /// Remove a tile from the cache.
    pub fn remove(&mut self, key: &TileKey) -> Option<Tile> {
        let tile = self.cache.pop(key)?;
        self.current_size = self.current_size.saturating_sub(Self::size_of(&tile));
        Some(tile)
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_size = 0;
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Current total size of cached tiles in bytes.
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

// =============================================================================
// Tests
// =============================================================================
