//! Draw planner: which tiles to draw, and where.
//!
//! The planner walks the tile grid at the current sample size, rejects
//! rows and tiles that fall outside the viewport, and requests every
//! remaining tile from a [`TileProvider`]. Cached tiles come back with
//! their pixels; everything else is a gap to fill on a later redraw.

use glam::DVec2;
use tracing::trace;

use crate::overlay::PlacedOverlay;
use crate::source::DecoderSource;
use crate::tile::{Tile, TileKey, TileLoader, TileRequestOutcome, TILE_SIZE};
use crate::viewport::{ScreenRect, ViewportState};

/// Something that can answer tile requests without blocking.
pub trait TileProvider {
    fn request_tile(&self, key: TileKey) -> TileRequestOutcome;
}

impl<S: DecoderSource> TileProvider for TileLoader<S> {
    fn request_tile(&self, key: TileKey) -> TileRequestOutcome {
        TileLoader::request_tile(self, key)
    }
}

/// One visible tile.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub key: TileKey,

    /// Pixels, or `None` if the tile is not decoded yet
    pub tile: Option<Tile>,

    /// Where the tile goes on screen
    pub dest: ScreenRect,
}

/// Visible tiles in row-major grid order, plus overlay markers to draw
/// on top of them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawPlan {
    pub items: Vec<DrawItem>,
    pub sample_size: u32,
    pub overlays: Vec<PlacedOverlay>,
}

impl DrawPlan {
    /// Number of visible tiles without pixels.
    pub fn missing_count(&self) -> usize {
        self.items.iter().filter(|item| item.tile.is_none()).count()
    }

    /// Whether every visible tile has pixels.
    pub fn is_complete(&self) -> bool {
        self.missing_count() == 0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Plan a draw of `image_size` through `viewport`.
///
/// Returns `None` if the viewport is not ready to draw.
pub fn plan<P>(viewport: &ViewportState, image_size: (u32, u32), provider: &P) -> Option<DrawPlan>
where
    P: TileProvider + ?Sized,
{
    let transform = viewport.sampled_image_to_screen()?;
    let sample = viewport.sample_size();
    let screen = viewport.screen_bounds();

    let sampled_width = image_size.0.div_ceil(sample);
    let sampled_height = image_size.1.div_ceil(sample);

    let mut items = Vec::new();

    for y in (0..sampled_height).step_by(TILE_SIZE as usize) {
        let bottom = (y + TILE_SIZE).min(sampled_height);

        let row = ScreenRect::from_transformed(
            &transform,
            DVec2::new(0.0, f64::from(y)),
            DVec2::new(f64::from(sampled_width), f64::from(bottom)),
        );
        if !row.intersects(&screen) {
            continue;
        }

        for x in (0..sampled_width).step_by(TILE_SIZE as usize) {
            let right = (x + TILE_SIZE).min(sampled_width);

            let dest = ScreenRect::from_transformed(
                &transform,
                DVec2::new(f64::from(x), f64::from(y)),
                DVec2::new(f64::from(right), f64::from(bottom)),
            );
            if !dest.intersects(&screen) {
                continue;
            }

            let key = TileKey::new(x * sample, y * sample, sample);
            let outcome = provider.request_tile(key);
            trace!(?key, ?outcome, "planned tile");

            items.push(DrawItem {
                key,
                tile: outcome.into_tile(),
                dest,
            });
        }
    }

    Some(DrawPlan {
        items,
        sample_size: sample,
        overlays: Vec::new(),
    })
}
