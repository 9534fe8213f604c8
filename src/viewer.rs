//! The owning-surface facade.
//!
//! [`TileViewer`] ties a decoder source, the tile loader and the viewport
//! together behind the small set of inputs a view receives: resizes,
//! resolved pan and zoom gestures, scroll steps and clicks.

use glam::DVec2;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::overlay::{OverlayAnchor, OverlayId, OverlaySet};
use crate::planner::{self, DrawPlan};
use crate::source::{DecoderPool, DecoderSource};
use crate::tile::{CacheStats, TileAvailableCallback, TileLoader, TileLoaderOptions};
use crate::viewport::{ViewState, Viewport, ViewportState, KEY_ZOOM_STEP};

/// A point in full-resolution image pixels.
pub type ImagePoint = DVec2;

/// Tile viewer for one image source at a time.
///
/// All inputs are cheap and never block. Tile decoding happens on the
/// runtime's blocking pool; the tile-available callback fires after each
/// decoded tile lands in the cache, and the owner should then call
/// [`TileViewer::plan`] again.
pub struct TileViewer<S: DecoderSource> {
    runtime: Handle,
    options: TileLoaderOptions,
    on_available: Option<TileAvailableCallback>,
    loader: Option<TileLoader<S>>,
    viewport: Viewport,
    overlays: OverlaySet,
}

impl<S: DecoderSource> TileViewer<S> {
    pub fn new(runtime: Handle, options: TileLoaderOptions) -> Self {
        Self {
            runtime,
            options,
            on_available: None,
            loader: None,
            viewport: Viewport::new(),
            overlays: OverlaySet::new(),
        }
    }

    /// Register the "tile became available" notification.
    ///
    /// Applies to sources attached afterwards.
    pub fn with_tile_available(mut self, callback: TileAvailableCallback) -> Self {
        self.on_available = Some(callback);
        self
    }

    /// Open `source` and make it the displayed image.
    ///
    /// Replaces any previous source along with its cache. The view is
    /// reset to fit the new image once the viewport size is known.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the image cannot be opened. The previous
    /// source, if any, stays attached in that case.
    pub fn attach_source(&mut self, source: S) -> Result<(), SourceError> {
        let decoders = DecoderPool::open(source)?;
        let (width, height) = decoders.dimensions();

        let mut loader = TileLoader::new(decoders, self.options, self.runtime.clone());
        if let Some(callback) = &self.on_available {
            loader = loader.with_tile_available(callback.clone());
        }

        info!(
            source = loader.identifier(),
            width,
            height,
            max_tasks = loader.max_tasks(),
            "Attached image source"
        );

        self.loader = Some(loader);
        self.viewport.set_image_size(width, height);
        Ok(())
    }

    /// Drop the current source and its cache.
    ///
    /// Decodes still running finish in the background and their results
    /// are discarded.
    pub fn detach_source(&mut self) {
        if let Some(loader) = self.loader.take() {
            debug!(source = loader.identifier(), "Detached image source");
        }
        self.viewport.clear_image();
    }

    pub fn has_source(&self) -> bool {
        self.loader.is_some()
    }

    /// The loader for the attached source.
    pub fn loader(&self) -> Option<&TileLoader<S>> {
        self.loader.as_ref()
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    pub fn on_viewport_resized(&mut self, width: u32, height: u32) {
        self.viewport.set_viewport_size(width, height);
    }

    /// A drag moved by `(dx, dy)` screen pixels.
    pub fn on_pan_delta(&mut self, dx: f64, dy: f64) {
        self.viewport.pan_by(dx, dy);
    }

    /// A pinch changed the zoom by `scale_factor` around a screen point.
    pub fn on_zoom_gesture(&mut self, focus_x: f64, focus_y: f64, scale_factor: f64) {
        self.viewport
            .zoom_at(DVec2::new(focus_x, focus_y), scale_factor);
    }

    /// One scroll-wheel step at the pointer. Negative `delta` zooms out.
    pub fn on_scroll(&mut self, x: f64, y: f64, delta: f64) {
        self.viewport.scroll_at(DVec2::new(x, y), delta);
    }

    /// One keyboard zoom step around the viewport center.
    pub fn on_zoom_key(&mut self, zoom_in: bool) {
        let factor = if zoom_in {
            KEY_ZOOM_STEP
        } else {
            1.0 / KEY_ZOOM_STEP
        };
        self.viewport.zoom_by(factor);
    }

    /// Image point under a screen point. `None` until ready to draw.
    pub fn on_click(&self, screen_x: f64, screen_y: f64) -> Option<ImagePoint> {
        self.viewport
            .screen_to_image(DVec2::new(screen_x, screen_y))
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        self.viewport.set_pan(x, y);
    }

    pub fn set_zoom(&mut self, scale: f64) {
        self.viewport.set_zoom(scale);
    }

    pub fn set_pan_zoom(&mut self, x: f64, y: f64, scale: f64) {
        self.viewport.set_pan_zoom(x, y, scale);
    }

    /// Re-center and fit the image. Returns `false` if sizes are unknown.
    pub fn fit_image(&mut self) -> bool {
        self.viewport.fit_image()
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Whether [`Self::plan`] can produce anything.
    pub fn is_ready_to_draw(&self) -> bool {
        self.loader.is_some() && self.viewport.is_ready()
    }

    /// Visible tiles and overlays for the current view, requesting
    /// decodes for any tiles that are missing.
    pub fn plan(&self) -> Option<DrawPlan> {
        let loader = self.loader.as_ref()?;
        let image_size = self.viewport.image_size()?;
        let mut plan = planner::plan(self.viewport.state(), image_size, loader)?;
        plan.overlays = self.overlays.place(self.viewport.state());
        Some(plan)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_state(&self) -> &ViewportState {
        self.viewport.state()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.loader.as_ref().map(TileLoader::cache_stats)
    }

    // =========================================================================
    // Overlays
    // =========================================================================

    /// Pin a marker to the image. Overlays outlive source changes.
    pub fn attach_overlay(&mut self, anchor: OverlayAnchor) -> OverlayId {
        self.overlays.attach(anchor)
    }

    pub fn detach_overlay(&mut self, id: OverlayId) -> Option<OverlayAnchor> {
        self.overlays.detach(id)
    }

    pub fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut OverlayAnchor> {
        self.overlays.get_mut(id)
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    /// The clickable overlay under a screen point, if any.
    pub fn overlay_at(&self, screen_x: f64, screen_y: f64) -> Option<OverlayId> {
        self.overlays
            .hit_test(self.viewport.state(), DVec2::new(screen_x, screen_y))
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Current pan and zoom, if a pan center is set.
    pub fn save_state(&self) -> Option<ViewState> {
        self.viewport.save_state()
    }

    pub fn restore_state(&mut self, saved: ViewState) {
        self.viewport.restore_state(saved);
    }
}
