//! Zoom limits, sample-size selection and screen rectangles.

use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};

/// Largest sample size ever selected.
pub const MAX_SAMPLE_SIZE: u32 = 32;

/// Zoom limits used before image and viewport sizes are known.
pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
pub const DEFAULT_MAX_ZOOM: f64 = 5.0;

/// Minimum zoom leaves this much of the fitted size visible as margin.
const MIN_ZOOM_MARGIN: f64 = 0.8;

/// Maximum zoom for images that are large relative to the viewport.
const BASE_MAX_ZOOM: f64 = 6.0;

/// Sample size for a zoom scale.
///
/// This is the smallest power of two `s` with `s * scale > 0.5`, capped at
/// [`MAX_SAMPLE_SIZE`]. At zoom 0.3, a sample size of 1 would decode at
/// more than three times the resolution shown, so 2 is used.
pub fn calculate_sample_size(scale: f64) -> u32 {
    let mut sample = 1;
    while sample < MAX_SAMPLE_SIZE {
        if f64::from(sample) * scale > 0.5 {
            return sample;
        }
        sample *= 2;
    }
    MAX_SAMPLE_SIZE
}

/// Allowed zoom range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_ZOOM,
            max: DEFAULT_MAX_ZOOM,
        }
    }
}

impl ZoomLimits {
    /// Limits for an image shown in a viewport.
    ///
    /// Zooming out stops once the whole image plus some margin fits, but
    /// never forces a zoom above 1:1. Zooming in goes to 6x, or further
    /// for small images so they can still fill the viewport.
    pub fn compute(viewport: (u32, u32), image: (u32, u32)) -> Option<Self> {
        let (relative_width, relative_height) = relative_size(viewport, image)?;

        Some(Self {
            min: MIN_ZOOM_MARGIN * relative_width.min(relative_height).min(1.0),
            max: relative_width.max(relative_height).max(BASE_MAX_ZOOM),
        })
    }

    pub fn clamp(&self, scale: f64) -> f64 {
        scale.max(self.min).min(self.max)
    }
}

/// Zoom that shows the whole image without zooming in past 1:1.
pub fn fit_zoom(viewport: (u32, u32), image: (u32, u32)) -> Option<f64> {
    let (relative_width, relative_height) = relative_size(viewport, image)?;
    Some(relative_width.min(relative_height).min(1.0))
}

fn relative_size(viewport: (u32, u32), image: (u32, u32)) -> Option<(f64, f64)> {
    if viewport.0 == 0 || viewport.1 == 0 || image.0 == 0 || image.1 == 0 {
        return None;
    }
    Some((
        f64::from(viewport.0) / f64::from(image.0),
        f64::from(viewport.1) / f64::from(image.1),
    ))
}

// =============================================================================
// Screen Rect
// =============================================================================

/// Axis-aligned rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ScreenRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Bounding rectangle of `(min, max)` after mapping both corners.
    ///
    /// The transforms used here only scale and translate, so the mapped
    /// corners are the corners of the result.
    pub fn from_transformed(transform: &DAffine2, min: DVec2, max: DVec2) -> Self {
        let a = transform.transform_point2(min);
        let b = transform.transform_point2(max);
        Self::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Whether the two rectangles share any area.
    pub fn intersects(&self, other: &ScreenRect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}
