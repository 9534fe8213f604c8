//! Viewport transform.
//!
//! Pure geometry: pan/zoom state, zoom limits, sample-size selection and
//! the screen/image coordinate transforms. Nothing here touches tiles.
//!
//! # Coordinate spaces
//!
//! ```text
//!   image space            sampled-image space          screen space
//!   (full-res pixels)      (image / sample_size)        (viewport pixels)
//!
//!        p ───────────── image_to_screen ─────────────────▶ q
//!        ▲                                                 │
//!        └──────────────── screen_to_image ◀───────────────┘
//!
//!                              t ── sampled_image_to_screen ─▶ q
//! ```
//!
//! `image_to_screen = T(half_viewport) · S(zoom) · T(-pan_center)` and
//! `screen_to_image` is its exact inverse.
//!
//! # Example
//!
//! ```
//! use tileview::viewport::Viewport;
//!
//! let mut viewport = Viewport::new();
//! viewport.set_image_size(2048, 2048);
//! viewport.set_viewport_size(512, 512);
//!
//! assert_eq!(viewport.zoom(), 0.25);
//! assert_eq!(viewport.sample_size(), 4);
//! ```

mod controller;
mod geometry;
mod transform;

pub use controller::{Viewport, KEY_ZOOM_STEP, SCROLL_ZOOM_IN, SCROLL_ZOOM_OUT};
pub use geometry::{
    calculate_sample_size, fit_zoom, ScreenRect, ZoomLimits, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM,
    MAX_SAMPLE_SIZE,
};
pub use transform::{ViewState, ViewportState};
