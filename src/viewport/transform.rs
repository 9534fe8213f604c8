//! Pan/zoom state and the affine transforms derived from it.

use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};

use super::geometry::{calculate_sample_size, ScreenRect};

/// Pan, zoom and viewport size at one instant.
///
/// All transforms are derived on demand, so they can never disagree with
/// the state they came from. Before a pan center exists there is nothing
/// to draw and every transform is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Image-space point shown at the center of the viewport
    pub pan_center: Option<DVec2>,

    /// Screen pixels per image pixel
    pub zoom_scale: f64,

    /// Viewport `(width, height)` in screen pixels
    pub viewport_size: (u32, u32),
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            pan_center: None,
            zoom_scale: 1.0,
            viewport_size: (0, 0),
        }
    }
}

impl ViewportState {
    pub fn new(pan_center: Option<DVec2>, zoom_scale: f64, viewport_size: (u32, u32)) -> Self {
        Self {
            pan_center,
            zoom_scale,
            viewport_size,
        }
    }

    /// Downsample level for the current zoom.
    pub fn sample_size(&self) -> u32 {
        calculate_sample_size(self.zoom_scale)
    }

    /// Whether the state can be used for drawing.
    pub fn is_ready(&self) -> bool {
        self.pan_center.is_some()
            && self.viewport_size.0 > 0
            && self.viewport_size.1 > 0
            && self.zoom_scale.is_finite()
            && self.zoom_scale > 0.0
    }

    fn half_viewport(&self) -> DVec2 {
        DVec2::new(
            f64::from(self.viewport_size.0),
            f64::from(self.viewport_size.1),
        ) * 0.5
    }

    fn ready_pan(&self) -> Option<DVec2> {
        if self.is_ready() {
            self.pan_center
        } else {
            None
        }
    }

    /// Image pixels to screen pixels.
    pub fn image_to_screen(&self) -> Option<DAffine2> {
        let pan = self.ready_pan()?;
        Some(
            DAffine2::from_translation(self.half_viewport())
                * DAffine2::from_scale(DVec2::splat(self.zoom_scale))
                * DAffine2::from_translation(-pan),
        )
    }

    /// Screen pixels to image pixels. Exact inverse of [`Self::image_to_screen`].
    pub fn screen_to_image(&self) -> Option<DAffine2> {
        let pan = self.ready_pan()?;
        Some(
            DAffine2::from_translation(pan)
                * DAffine2::from_scale(DVec2::splat(1.0 / self.zoom_scale))
                * DAffine2::from_translation(-self.half_viewport()),
        )
    }

    /// Sampled-image pixels (tile pixel space at the current sample size)
    /// to screen pixels.
    pub fn sampled_image_to_screen(&self) -> Option<DAffine2> {
        let pan = self.ready_pan()?;
        let sample = f64::from(self.sample_size());
        Some(
            DAffine2::from_translation(self.half_viewport())
                * DAffine2::from_scale(DVec2::splat(self.zoom_scale * sample))
                * DAffine2::from_translation(-pan / sample),
        )
    }

    pub fn map_image_to_screen(&self, point: DVec2) -> Option<DVec2> {
        self.image_to_screen()
            .map(|transform| transform.transform_point2(point))
    }

    pub fn map_screen_to_image(&self, point: DVec2) -> Option<DVec2> {
        self.screen_to_image()
            .map(|transform| transform.transform_point2(point))
    }

    /// The viewport as a screen rectangle.
    pub fn screen_bounds(&self) -> ScreenRect {
        ScreenRect::new(
            0.0,
            0.0,
            f64::from(self.viewport_size.0),
            f64::from(self.viewport_size.1),
        )
    }
}

/// Pan and zoom snapshot an owner can persist and restore later.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl ViewState {
    pub fn pan_center(&self) -> DVec2 {
        DVec2::new(self.pan_x, self.pan_y)
    }
}
