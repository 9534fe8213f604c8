//! Viewport controller: applies pan/zoom inputs to a [`ViewportState`].

use glam::DVec2;
use tracing::debug;

use super::geometry::{fit_zoom, ZoomLimits};
use super::transform::{ViewState, ViewportState};

/// Zoom factor for one scroll-wheel step towards the user.
pub const SCROLL_ZOOM_OUT: f64 = 0.9;

/// Zoom factor for one scroll-wheel step away from the user.
pub const SCROLL_ZOOM_IN: f64 = 1.1;

/// Zoom factor for one keyboard zoom step.
pub const KEY_ZOOM_STEP: f64 = 2.0;

/// Viewport state plus the image size and zoom limits that constrain it.
///
/// Every mutation leaves the zoom inside the current limits and, once the
/// image size is known, the pan center inside the image.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    state: ViewportState,
    image_size: Option<(u32, u32)>,
    limits: ZoomLimits,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        self.state.viewport_size
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub fn zoom(&self) -> f64 {
        self.state.zoom_scale
    }

    pub fn pan_center(&self) -> Option<DVec2> {
        self.state.pan_center
    }

    pub fn sample_size(&self) -> u32 {
        self.state.sample_size()
    }

    /// Whether there is something to draw: image known, pan set, viewport non-empty.
    pub fn is_ready(&self) -> bool {
        self.image_size.is_some() && self.state.is_ready()
    }

    // =========================================================================
    // Size changes
    // =========================================================================

    /// A new image was attached. Pan is reset and the image fitted once
    /// the viewport size is known.
    pub fn set_image_size(&mut self, width: u32, height: u32) {
        self.image_size = Some((width, height));
        self.state.pan_center = None;
        self.update_limits();
        self.fit_image();
    }

    /// The image was detached.
    pub fn clear_image(&mut self) {
        self.image_size = None;
        self.state.pan_center = None;
        self.limits = ZoomLimits::default();
    }

    /// The viewport was resized.
    ///
    /// An explicitly set pan center survives the resize; only the zoom is
    /// re-clamped to the new limits. Without one the image is fitted. An
    /// empty viewport has no limits, so the zoom is left alone.
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.state.viewport_size = (width, height);
        let known = self.update_limits();

        if self.state.pan_center.is_none() {
            self.fit_image();
        } else if known {
            self.state.zoom_scale = self.limits.clamp(self.state.zoom_scale);
        }
    }

    /// Recompute the zoom limits. Returns `false` if they fell back to the
    /// defaults because a size is unknown.
    fn update_limits(&mut self) -> bool {
        let computed = self
            .image_size
            .and_then(|image| ZoomLimits::compute(self.state.viewport_size, image));
        self.limits = computed.unwrap_or_default();
        debug!(min = self.limits.min, max = self.limits.max, "zoom limits");
        computed.is_some()
    }

    // =========================================================================
    // Pan / zoom
    // =========================================================================

    /// Center the image and zoom so it fits, never past 1:1.
    ///
    /// Returns `false` if the image or viewport size is unknown.
    pub fn fit_image(&mut self) -> bool {
        let Some(image) = self.image_size else {
            return false;
        };
        let Some(zoom) = fit_zoom(self.state.viewport_size, image) else {
            return false;
        };

        self.state.pan_center = Some(DVec2::new(f64::from(image.0), f64::from(image.1)) * 0.5);
        self.state.zoom_scale = self.limits.clamp(zoom);
        true
    }

    /// Set the pan center in image coordinates.
    pub fn set_pan(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            debug!(x, y, "ignoring non-finite pan");
            return;
        }
        self.state.pan_center = Some(DVec2::new(x, y));
        self.clamp_pan();
    }

    /// Set the zoom scale, clamped to the current limits.
    pub fn set_zoom(&mut self, scale: f64) {
        if !scale.is_finite() || scale <= 0.0 {
            debug!(scale, "ignoring invalid zoom");
            return;
        }
        self.state.zoom_scale = self.limits.clamp(scale);
    }

    pub fn set_pan_zoom(&mut self, x: f64, y: f64, scale: f64) {
        self.set_pan(x, y);
        self.set_zoom(scale);
    }

    /// Move the view by a screen-space delta, as a drag does.
    ///
    /// Dragging right moves the pan center left in the image.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let pan = self.state.pan_center.unwrap_or(DVec2::ZERO);
        self.state.pan_center = Some(pan - DVec2::new(dx, dy) / self.state.zoom_scale);
        self.clamp_pan();
    }

    /// Multiply the zoom by `factor`, keeping the image point under the
    /// screen point `focus` fixed.
    pub fn zoom_at(&mut self, focus: DVec2, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 || !focus.is_finite() {
            debug!(factor, "ignoring invalid zoom gesture");
            return;
        }

        let old_zoom = self.state.zoom_scale;
        let new_zoom = self.limits.clamp(old_zoom * factor);
        let applied = new_zoom / old_zoom;

        let offset = (focus - self.half_viewport()) / new_zoom;
        let pan = self.state.pan_center.unwrap_or(DVec2::ZERO);

        self.state.zoom_scale = new_zoom;
        self.state.pan_center = Some(pan - offset * (1.0 - applied));
        self.clamp_pan();
    }

    /// One scroll-wheel step at `focus`. Negative deltas zoom out.
    pub fn scroll_at(&mut self, focus: DVec2, delta: f64) {
        let factor = if delta < 0.0 {
            SCROLL_ZOOM_OUT
        } else {
            SCROLL_ZOOM_IN
        };
        self.zoom_at(focus, factor);
    }

    /// Multiply the zoom by `factor` around the viewport center.
    pub fn zoom_by(&mut self, factor: f64) {
        self.zoom_at(self.half_viewport(), factor);
    }

    fn half_viewport(&self) -> DVec2 {
        let (width, height) = self.state.viewport_size;
        DVec2::new(f64::from(width), f64::from(height)) * 0.5
    }

    fn clamp_pan(&mut self) {
        let (Some(pan), Some((width, height))) = (self.state.pan_center, self.image_size) else {
            return;
        };
        let max = DVec2::new(f64::from(width), f64::from(height));
        self.state.pan_center = Some(pan.clamp(DVec2::ZERO, max));
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Pan and zoom, if a pan center is set.
    pub fn save_state(&self) -> Option<ViewState> {
        self.state.pan_center.map(|pan| ViewState {
            pan_x: pan.x,
            pan_y: pan.y,
            zoom: self.state.zoom_scale,
        })
    }

    /// Apply a saved snapshot through [`Self::set_pan_zoom`].
    pub fn restore_state(&mut self, saved: ViewState) {
        self.set_pan_zoom(saved.pan_x, saved.pan_y, saved.zoom);
    }

    /// Screen point to image point. `None` until ready to draw.
    pub fn screen_to_image(&self, point: DVec2) -> Option<DVec2> {
        if self.image_size.is_none() {
            return None;
        }
        self.state.map_screen_to_image(point)
    }
}
