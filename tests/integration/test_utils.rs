//! Test utilities for integration tests.
//!
//! This module provides a scriptable mock decoder source and helpers for
//! creating encoded test images.

use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tileview::error::{DecodeError, SourceError};
use tileview::source::{DecoderSource, PixelRegion, RegionDecoder};

// =============================================================================
// Gate
// =============================================================================

/// Blocks decodes until the test opens it.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    /// Wait until open, giving up after a few seconds so a broken test
    /// cannot hang the suite.
    fn wait(&self) {
        let guard = self.open.lock().unwrap();
        let _ = self
            .changed
            .wait_timeout_while(guard, Duration::from_secs(5), |open| !*open)
            .unwrap();
    }
}

// =============================================================================
// Mock Source
// =============================================================================

/// Counters shared by a [`MockSource`] and every handle it opens.
#[derive(Default)]
pub struct MockStats {
    pub opens: AtomicUsize,
    pub decodes: AtomicUsize,
    pub failures: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub regions: Mutex<Vec<(PixelRegion, u32)>>,
}

impl MockStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Highest number of decodes that ran at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn regions(&self) -> Vec<(PixelRegion, u32)> {
        self.regions.lock().unwrap().clone()
    }
}

/// How a mock decode should go wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Error,
    Panic,
}

/// A decoder source with scriptable behavior.
///
/// Decoded tiles are filled with a color derived from the region origin,
/// so tests can tell tiles apart.
pub struct MockSource {
    width: u32,
    height: u32,
    reopenable: bool,
    panic_on_reopen: bool,
    gate: Option<Arc<Gate>>,
    faults: Arc<Mutex<Vec<Fault>>>,
    fail_origins: HashSet<(u32, u32)>,
    stats: Arc<MockStats>,
}

impl MockSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            reopenable: true,
            panic_on_reopen: false,
            gate: None,
            faults: Arc::new(Mutex::new(Vec::new())),
            fail_origins: HashSet::new(),
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Behave like a stream: a single shared handle.
    pub fn single_handle(mut self) -> Self {
        self.reopenable = false;
        self
    }

    /// Open the first handle normally, then panic on every later open.
    pub fn panicking_reopen(mut self) -> Self {
        self.panic_on_reopen = true;
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Apply `faults` to the next decodes, in order.
    pub fn with_faults(self, faults: &[Fault]) -> Self {
        self.faults.lock().unwrap().extend(faults.iter().rev());
        self
    }

    /// Always fail regions starting at `(x, y)`.
    pub fn failing_at(mut self, x: u32, y: u32) -> Self {
        self.fail_origins.insert((x, y));
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

impl DecoderSource for MockSource {
    type Decoder = MockDecoder;

    fn open(&self) -> Result<MockDecoder, SourceError> {
        let opened = self.stats.opens.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_reopen && opened > 0 {
            panic!("mock source panicked while opening a handle");
        }
        Ok(MockDecoder {
            width: self.width,
            height: self.height,
            gate: self.gate.clone(),
            faults: self.faults.clone(),
            fail_origins: self.fail_origins.clone(),
            stats: self.stats.clone(),
        })
    }

    fn can_reopen(&self) -> bool {
        self.reopenable
    }

    fn identifier(&self) -> &str {
        "mock"
    }
}

pub struct MockDecoder {
    width: u32,
    height: u32,
    gate: Option<Arc<Gate>>,
    faults: Arc<Mutex<Vec<Fault>>>,
    fail_origins: HashSet<(u32, u32)>,
    stats: Arc<MockStats>,
}

impl RegionDecoder for MockDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn decode_region(
        &mut self,
        region: PixelRegion,
        sample_size: u32,
    ) -> Result<RgbaImage, DecodeError> {
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);
        self.stats
            .regions
            .lock()
            .unwrap()
            .push((region, sample_size));

        if let Some(gate) = &self.gate {
            gate.wait();
        }

        let fault = self.faults.lock().unwrap().pop();
        self.stats.active.fetch_sub(1, Ordering::SeqCst);

        match fault {
            Some(Fault::Panic) => panic!("mock decoder panicked"),
            Some(Fault::Error) => {
                self.stats.failures.fetch_add(1, Ordering::SeqCst);
                return Err(DecodeError::Failed {
                    message: "scripted failure".to_string(),
                });
            }
            None => {}
        }

        if self.fail_origins.contains(&(region.left, region.top)) {
            self.stats.failures.fetch_add(1, Ordering::SeqCst);
            return Err(DecodeError::Failed {
                message: format!("region at ({}, {}) is corrupt", region.left, region.top),
            });
        }

        self.stats.decodes.fetch_add(1, Ordering::SeqCst);
        let (width, height) = region.sampled_size(sample_size);
        Ok(RgbaImage::from_pixel(width, height, origin_color(region.left, region.top)))
    }
}

/// Fill color the mock decoder uses for a region origin.
pub fn origin_color(x: u32, y: u32) -> Rgba<u8> {
    Rgba([(x / 512 % 256) as u8, (y / 512 % 256) as u8, 0x80, 0xff])
}

// =============================================================================
// Encoded Images
// =============================================================================

/// An image whose pixel at `(x, y)` encodes its own position.
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x / 256) % 256) as u8, 0xff])
    })
}

/// PNG-encoded bytes of `image`.
pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A PNG on disk, removed when dropped.
pub struct TempPng {
    path: PathBuf,
}

impl TempPng {
    pub fn new(image: &RgbaImage) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tileview-test-{}-{}.png",
            std::process::id(),
            id
        ));
        std::fs::write(&path, encode_png(image)).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for TempPng {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
