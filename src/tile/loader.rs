//! Tile loader: in-flight tracking and the decode worker pool.
//!
//! The loader answers tile requests from the draw loop without blocking.
//! A miss dispatches a decode task to tokio's blocking pool unless the same
//! key is already being decoded or `max_tasks` decodes are running.
//!
//! # Consistency
//!
//! The tile cache and the in-flight set live behind one mutex, so the
//! "not cached, not in flight, dispatch" decision and a worker's
//! "cache, clear in-flight" completion can never interleave. A key has at
//! most one outstanding decode at any time.
//!
//! Tasks hold only a weak reference to that state. Dropping the loader (a
//! new source, or the view going away) leaves running decodes to finish
//! and discard their result.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::source::{DecoderPool, DecoderSource, RegionDecoder};
use crate::sync::lock;

use super::budget::default_cache_capacity_kb;
use super::cache::{Tile, TileCache, TileKey};

// =============================================================================
// Types
// =============================================================================

/// Result of a tile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileRequestOutcome {
    /// The tile was in the cache
    AlreadyCached(Tile),

    /// A decode task was dispatched for the tile
    DecodeStarted,

    /// A decode for this tile is already running
    AlreadyInFlight,

    /// Too many decodes are running; retry on a later draw
    WorkerPoolSaturated,
}

impl TileRequestOutcome {
    /// The tile, if it was cached.
    pub fn into_tile(self) -> Option<Tile> {
        match self {
            TileRequestOutcome::AlreadyCached(tile) => Some(tile),
            _ => None,
        }
    }
}

/// Called after a decoded tile has been stored in the cache.
pub type TileAvailableCallback = Arc<dyn Fn() + Send + Sync>;

/// Sizing for a [`TileLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLoaderOptions {
    /// Cache capacity in kilobytes
    pub cache_capacity_kb: usize,

    /// Maximum number of concurrent decode tasks
    pub max_tasks: usize,
}

impl TileLoaderOptions {
    pub fn new(cache_capacity_kb: usize, max_tasks: usize) -> Self {
        Self {
            cache_capacity_kb,
            max_tasks,
        }
    }

    /// Capacity from the detected memory ceiling, tasks from the CPU count.
    pub fn detect() -> Self {
        Self::new(default_cache_capacity_kb(), default_max_tasks())
    }
}

impl Default for TileLoaderOptions {
    fn default() -> Self {
        Self::detect()
    }
}

/// At least two decode tasks, otherwise one per available CPU.
pub fn default_max_tasks() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .max(2)
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub occupied_bytes: usize,
    pub capacity_bytes: usize,
    pub entries: usize,
    pub in_flight: usize,
}

// =============================================================================
// Shared State
// =============================================================================

struct LoaderState {
    cache: TileCache,
    in_flight: HashSet<TileKey>,
}

struct Shared {
    state: Mutex<LoaderState>,

    /// Tasks dispatched and not yet finished, including their notification
    active: AtomicUsize,

    /// Signalled whenever a task finishes
    idle: Notify,
}

// =============================================================================
// Tile Loader
// =============================================================================

/// Tile cache plus the worker pool that fills it.
///
/// # Type Parameters
///
/// * `S` - The decoder source for the attached image
pub struct TileLoader<S: DecoderSource> {
    shared: Arc<Shared>,
    decoders: Arc<DecoderPool<S>>,
    runtime: Handle,
    max_tasks: usize,
    on_available: Option<TileAvailableCallback>,
}

impl<S: DecoderSource> TileLoader<S> {
    /// Create a loader for an opened decoder pool.
    ///
    /// Decode tasks run on `runtime`'s blocking thread pool.
    pub fn new(decoders: DecoderPool<S>, options: TileLoaderOptions, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LoaderState {
                    cache: TileCache::with_capacity_kb(options.cache_capacity_kb),
                    in_flight: HashSet::new(),
                }),
                active: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
            decoders: Arc::new(decoders),
            runtime,
            max_tasks: options.max_tasks.max(1),
            on_available: None,
        }
    }

    /// Register the "tile became available" notification.
    pub fn with_tile_available(mut self, callback: TileAvailableCallback) -> Self {
        self.on_available = Some(callback);
        self
    }

    /// Get a tile, dispatching a decode on a miss.
    ///
    /// Never blocks on decoding. The steps, under one lock:
    /// 1. Cached: return it (and mark it recently used)
    /// 2. Already in flight: no new task
    /// 3. `max_tasks` decodes running: no new task, caller retries later
    /// 4. Otherwise mark in flight and dispatch
    pub fn request_tile(&self, key: TileKey) -> TileRequestOutcome {
        let mut state = lock(&self.shared.state);

        if let Some(tile) = state.cache.get(&key) {
            return TileRequestOutcome::AlreadyCached(tile);
        }

        if state.in_flight.contains(&key) {
            return TileRequestOutcome::AlreadyInFlight;
        }

        if state.in_flight.len() >= self.max_tasks {
            return TileRequestOutcome::WorkerPoolSaturated;
        }

        state.in_flight.insert(key);
        self.shared.active.fetch_add(1, Ordering::SeqCst);
        drop(state);

        debug!(?key, "dispatching tile decode");
        let task = TileTask {
            key,
            shared: Arc::downgrade(&self.shared),
            decoders: Arc::clone(&self.decoders),
            on_available: self.on_available.clone(),
        };
        self.runtime.spawn_blocking(move || task.run());

        TileRequestOutcome::DecodeStarted
    }

    /// Get a cached tile without dispatching anything.
    pub fn get_cached(&self, key: &TileKey) -> Option<Tile> {
        lock(&self.shared.state).cache.get(key)
    }

    /// Whether a decode for `key` is running.
    pub fn is_in_flight(&self, key: &TileKey) -> bool {
        lock(&self.shared.state).in_flight.contains(key)
    }

    /// Number of running decodes.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.shared.state).in_flight.len()
    }

    /// Maximum number of concurrent decodes.
    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    /// Full-resolution `(width, height)` of the attached image.
    pub fn dimensions(&self) -> (u32, u32) {
        self.decoders.dimensions()
    }

    /// Identifier of the attached source.
    pub fn identifier(&self) -> &str {
        self.decoders.identifier()
    }

    /// Cache occupancy and running decodes.
    pub fn cache_stats(&self) -> CacheStats {
        let state = lock(&self.shared.state);
        CacheStats {
            occupied_bytes: state.cache.size(),
            capacity_bytes: state.cache.capacity(),
            entries: state.cache.len(),
            in_flight: state.in_flight.len(),
        }
    }

    /// Drop all cached tiles. Running decodes are unaffected.
    pub fn clear_cache(&self) {
        lock(&self.shared.state).cache.clear();
    }

    /// Wait until every dispatched task has finished, notification included.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

// =============================================================================
// Tile Task
// =============================================================================

/// One decode, run on a blocking worker thread.
struct TileTask<S: DecoderSource> {
    key: TileKey,
    shared: Weak<Shared>,
    decoders: Arc<DecoderPool<S>>,
    on_available: Option<TileAvailableCallback>,
}

impl<S: DecoderSource> TileTask<S> {
    fn run(self) {
        if self.shared.strong_count() == 0 {
            debug!(key = ?self.key, "loader dropped, skipping decode");
            return;
        }

        let tile = match self.decode() {
            Ok(tile) => tile,
            Err(e) => {
                warn!(key = ?self.key, error = %e, "tile decode failed");
                None
            }
        };

        self.complete(tile);
    }

    fn decode(&self) -> Result<Option<Tile>, DecodeError> {
        let (width, height) = self.decoders.dimensions();
        let Some(region) = self.key.region(width, height) else {
            debug!(key = ?self.key, "tile outside image bounds");
            return Ok(None);
        };

        // Opening a per-worker handle can decode the whole image, so it
        // runs under the same guard as the region decode. A handle that
        // panicked is dropped during unwinding and never reused.
        let decoders = &self.decoders;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut lease = decoders.acquire();
            let decoded = lease.decode_region(region, self.key.downsample);
            decoders.release(lease);
            decoded
        }));

        match result {
            Ok(decoded) => decoded.map(|image| Some(Tile::from_rgba(image))),
            Err(_) => Err(DecodeError::WorkerPanicked),
        }
    }

    fn complete(self, tile: Option<Tile>) {
        let Some(shared) = self.shared.upgrade() else {
            debug!(key = ?self.key, "loader dropped, discarding tile");
            return;
        };

        let produced = {
            let mut state = lock(&shared.state);
            let produced = match tile {
                Some(tile) => {
                    let produced = !tile.is_empty();
                    state.cache.put(self.key, tile);
                    produced
                }
                None => false,
            };
            state.in_flight.remove(&self.key);
            produced
        };

        if produced {
            if let Some(callback) = &self.on_available {
                callback();
            }
        }

        shared.active.fetch_sub(1, Ordering::SeqCst);
        shared.idle.notify_waiters();
    }
}

// =============================================================================
// Tests
// =============================================================================
