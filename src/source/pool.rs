//! Decoder handle pool.
//!
//! The pool owns one shared handle, opened when the source is attached, and
//! a free list of per-worker handles. A worker first takes a spare handle,
//! then tries to open a fresh one if the source supports re-opening, and
//! finally falls back to the shared handle, which serializes decodes.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::SourceError;
use crate::sync::lock;

use super::decoder::{DecoderSource, RegionDecoder};

/// A decoder handle checked out of a [`DecoderPool`].
pub enum DecoderLease<'a, D> {
    /// A handle owned by this worker for the duration of the decode
    PerWorker(D),

    /// The shared handle, locked for exclusive use
    Shared(MutexGuard<'a, D>),
}

impl<D> DecoderLease<'_, D> {
    /// Whether this lease holds a per-worker handle.
    pub fn is_per_worker(&self) -> bool {
        matches!(self, DecoderLease::PerWorker(_))
    }
}

impl<D> Deref for DecoderLease<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        match self {
            DecoderLease::PerWorker(decoder) => decoder,
            DecoderLease::Shared(guard) => &**guard,
        }
    }
}

impl<D> DerefMut for DecoderLease<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        match self {
            DecoderLease::PerWorker(decoder) => decoder,
            DecoderLease::Shared(guard) => &mut **guard,
        }
    }
}

/// Pool of decoder handles for one attached source.
pub struct DecoderPool<S: DecoderSource> {
    source: S,

    /// Handle opened at attach time, used when no per-worker handle exists
    shared: Mutex<S::Decoder>,

    /// Per-worker handles returned after use
    spare: Mutex<Vec<S::Decoder>>,

    width: u32,
    height: u32,
}

impl<S: DecoderSource> DecoderPool<S> {
    /// Open the shared handle for `source`.
    ///
    /// # Errors
    ///
    /// Returns the source's error if the image cannot be opened. This is the
    /// only place a [`SourceError`] reaches the caller.
    pub fn open(source: S) -> Result<Self, SourceError> {
        let shared = source.open()?;
        let (width, height) = shared.dimensions();
        if width == 0 || height == 0 {
            return Err(SourceError::InvalidDimensions { width, height });
        }

        Ok(Self {
            source,
            shared: Mutex::new(shared),
            spare: Mutex::new(Vec::new()),
            width,
            height,
        })
    }

    /// Full-resolution `(width, height)` of the source image.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Identifier of the underlying source.
    pub fn identifier(&self) -> &str {
        self.source.identifier()
    }

    /// Check out a handle. May block on the shared handle.
    pub fn acquire(&self) -> DecoderLease<'_, S::Decoder> {
        if let Some(decoder) = lock(&self.spare).pop() {
            return DecoderLease::PerWorker(decoder);
        }

        if self.source.can_reopen() {
            match self.source.open() {
                Ok(decoder) => {
                    debug!(source = self.identifier(), "opened per-worker decoder");
                    return DecoderLease::PerWorker(decoder);
                }
                Err(e) => {
                    warn!(
                        source = self.identifier(),
                        error = %e,
                        "could not open per-worker decoder, using shared handle"
                    );
                }
            }
        }

        DecoderLease::Shared(lock(&self.shared))
    }

    /// Return a handle. Per-worker handles go back on the free list.
    pub fn release(&self, lease: DecoderLease<'_, S::Decoder>) {
        if let DecoderLease::PerWorker(decoder) = lease {
            lock(&self.spare).push(decoder);
        }
    }

    /// Number of per-worker handles waiting on the free list.
    pub fn spare_count(&self) -> usize {
        lock(&self.spare).len()
    }
}

// =============================================================================
// Tests
// =============================================================================
