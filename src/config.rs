//! Configuration for the `tileview` binary.
//!
//! Every option can be given on the command line or through a `TILEVIEW_`
//! environment variable:
//!
//! - `TILEVIEW_IMAGE` - Image file to open
//! - `TILEVIEW_VIEWPORT` - Viewport size as `WIDTHxHEIGHT` (default: 1280x720)
//! - `TILEVIEW_PAN_X` / `TILEVIEW_PAN_Y` - Pan center in image pixels (default: fit)
//! - `TILEVIEW_ZOOM` - Zoom scale (default: fit)
//! - `TILEVIEW_CACHE_FRACTION` - Cache gets 1/N of the memory ceiling (default: 4)
//! - `TILEVIEW_CACHE_KB` - Fixed cache size in KB, overrides the fraction
//! - `TILEVIEW_WORKERS` - Concurrent decode tasks (default: max(2, CPUs))
//! - `TILEVIEW_ATTEMPTS` - Redraw attempts before giving up (default: 64)
//! - `TILEVIEW_WAIT_MS` - How long one attempt waits for a tile (default: 10000)
//!
//! Library types never see this struct; [`Config::loader_options`] turns it
//! into plain [`TileLoaderOptions`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;
use crate::tile::{
    cache_capacity_kb, default_max_tasks, memory_ceiling_bytes, TileLoaderOptions,
    DEFAULT_CACHE_FRACTION,
};

/// Default viewport when none is given.
pub const DEFAULT_VIEWPORT: &str = "1280x720";

/// Default number of redraw attempts.
pub const DEFAULT_ATTEMPTS: u32 = 64;

/// Default wait for a tile notification per attempt, in milliseconds.
pub const DEFAULT_WAIT_MS: u64 = 10_000;

// =============================================================================
// Viewport Size
// =============================================================================

/// Viewport dimensions parsed from `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for ViewportSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidViewport(s.to_string());

        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for ViewportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// tileview - plan the visible tiles of a large image.
///
/// Opens an image, positions a viewport over it and decodes the visible
/// tiles at the resolution the zoom calls for, then prints the draw plan.
#[derive(Parser, Debug, Clone)]
#[command(name = "tileview")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Image file to open.
    #[arg(env = "TILEVIEW_IMAGE")]
    pub image: PathBuf,

    /// Viewport size as WIDTHxHEIGHT.
    #[arg(long, default_value = DEFAULT_VIEWPORT, env = "TILEVIEW_VIEWPORT")]
    pub viewport: ViewportSize,

    /// Pan center x in image pixels. Requires --pan-y.
    #[arg(long, env = "TILEVIEW_PAN_X", allow_negative_numbers = true)]
    pub pan_x: Option<f64>,

    /// Pan center y in image pixels. Requires --pan-x.
    #[arg(long, env = "TILEVIEW_PAN_Y", allow_negative_numbers = true)]
    pub pan_y: Option<f64>,

    /// Zoom scale (screen pixels per image pixel), clamped to the zoom limits.
    #[arg(long, env = "TILEVIEW_ZOOM")]
    pub zoom: Option<f64>,

    /// The tile cache gets 1/N of the memory ceiling.
    #[arg(long, default_value_t = DEFAULT_CACHE_FRACTION, env = "TILEVIEW_CACHE_FRACTION")]
    pub cache_fraction: u64,

    /// Fixed tile cache size in KB. Overrides --cache-fraction.
    #[arg(long, env = "TILEVIEW_CACHE_KB")]
    pub cache_kb: Option<usize>,

    /// Number of concurrent decode tasks. Defaults to max(2, CPU count).
    #[arg(long, env = "TILEVIEW_WORKERS")]
    pub workers: Option<usize>,

    /// Redraw attempts before giving up on missing tiles.
    #[arg(long, default_value_t = DEFAULT_ATTEMPTS, env = "TILEVIEW_ATTEMPTS")]
    pub attempts: u32,

    /// Milliseconds one redraw attempt waits for a tile to arrive.
    #[arg(long, default_value_t = DEFAULT_WAIT_MS, env = "TILEVIEW_WAIT_MS")]
    pub wait_ms: u64,

    /// Print the plan as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pan_x.is_some() != self.pan_y.is_some() {
            return Err(ConfigError::PartialPan);
        }

        if let (Some(x), Some(y)) = (self.pan_x, self.pan_y) {
            if !x.is_finite() || !y.is_finite() {
                return Err(ConfigError::OutOfRange {
                    name: "pan",
                    expected: "a finite number",
                });
            }
        }

        if let Some(zoom) = self.zoom {
            if !zoom.is_finite() || zoom <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    name: "zoom",
                    expected: "a positive number",
                });
            }
        }

        if self.cache_fraction == 0 {
            return Err(ConfigError::OutOfRange {
                name: "cache_fraction",
                expected: "greater than 0",
            });
        }

        if self.cache_kb == Some(0) {
            return Err(ConfigError::OutOfRange {
                name: "cache_kb",
                expected: "greater than 0",
            });
        }

        if self.workers == Some(0) {
            return Err(ConfigError::OutOfRange {
                name: "workers",
                expected: "greater than 0",
            });
        }

        if self.attempts == 0 {
            return Err(ConfigError::OutOfRange {
                name: "attempts",
                expected: "greater than 0",
            });
        }

        Ok(())
    }

    /// Cache size and worker count for the tile loader.
    pub fn loader_options(&self) -> TileLoaderOptions {
        let cache_kb = self
            .cache_kb
            .unwrap_or_else(|| cache_capacity_kb(memory_ceiling_bytes(), self.cache_fraction));
        let workers = self.workers.unwrap_or_else(default_max_tasks);
        TileLoaderOptions::new(cache_kb, workers)
    }

    /// Pan center, if both coordinates were given.
    pub fn pan(&self) -> Option<(f64, f64)> {
        self.pan_x.zip(self.pan_y)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}
