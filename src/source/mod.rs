//! Region decoder layer.
//!
//! This module wraps the capability of decoding a sub-rectangle of a large
//! source image at a given downsample factor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Tile Worker Pool             │
//! └────────────────────┬────────────────────┘
//!                      │ acquire / release
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              DecoderPool                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ shared handle│  │ per-worker      │  │
//! │  │ (serialized) │  │ free list       │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ open()
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          DecoderSource Trait            │
//! │   (ImageSource: path or in-memory)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! A source that can be re-opened by path hands out extra handles so
//! workers decode in parallel. Otherwise every worker shares one handle
//! and decodes on it one at a time.

mod decoder;
mod pool;

pub use decoder::{DecoderSource, ImageRegionDecoder, ImageSource, PixelRegion, RegionDecoder};
pub use pool::{DecoderLease, DecoderPool};
