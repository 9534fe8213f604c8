//! Region decoder traits and the `image`-backed implementation.
//!
//! The [`RegionDecoder`] trait is the seam between the tile engine and
//! whatever can produce pixels for a rectangle of the source image. The
//! engine never decodes pixels itself; it only decides which regions to ask
//! for and at which sample size.

use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbaImage};
use tracing::debug;

use crate::error::{DecodeError, SourceError};

// =============================================================================
// Pixel Region
// =============================================================================

/// A rectangle in full-resolution image pixels.
///
/// `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRegion {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Size of this region after downsampling by `sample_size`.
    ///
    /// Partial pixels at the edges round up, so a non-empty region never
    /// shrinks to nothing.
    pub fn sampled_size(&self, sample_size: u32) -> (u32, u32) {
        let sample_size = sample_size.max(1);
        (
            self.width().div_ceil(sample_size),
            self.height().div_ceil(sample_size),
        )
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A handle that can decode sub-rectangles of one source image.
///
/// Decoding takes `&mut self`: a handle is used by one worker at a time.
/// Sharing a single handle between workers goes through a mutex in
/// [`DecoderPool`](super::DecoderPool).
pub trait RegionDecoder: Send + 'static {
    /// Full-resolution `(width, height)` of the source image.
    fn dimensions(&self) -> (u32, u32);

    /// Decode `region` downsampled by `sample_size` into RGBA pixels.
    ///
    /// The returned image is at most `ceil(region / sample_size)` pixels in
    /// each direction. This call may block for as long as the decode takes.
    fn decode_region(
        &mut self,
        region: PixelRegion,
        sample_size: u32,
    ) -> Result<RgbaImage, DecodeError>;
}

/// Opens [`RegionDecoder`] handles for one image.
pub trait DecoderSource: Send + Sync + 'static {
    /// The type of handle this source creates.
    type Decoder: RegionDecoder;

    /// Open a new decoder handle.
    fn open(&self) -> Result<Self::Decoder, SourceError>;

    /// Whether [`open`](Self::open) may be called again for extra handles.
    ///
    /// Stream-backed sources can only be opened once.
    fn can_reopen(&self) -> bool;

    /// Identifier for logging.
    fn identifier(&self) -> &str;
}

// =============================================================================
// Image Source
// =============================================================================

#[derive(Clone)]
enum Origin {
    Path(PathBuf),
    Memory(Bytes),
}

/// An image file or in-memory encoded image (JPEG or PNG).
///
/// The image is decoded once, by the first [`open`](DecoderSource::open).
/// Every later handle shares those pixels.
#[derive(Clone)]
pub struct ImageSource {
    origin: Origin,
    identifier: String,
    decoded: OnceLock<Arc<RgbaImage>>,
}

impl ImageSource {
    /// Source backed by a file. Workers get their own handles over the
    /// shared pixels, so region decodes run in parallel.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            identifier: path.display().to_string(),
            origin: Origin::Path(path),
            decoded: OnceLock::new(),
        }
    }

    /// Source backed by encoded bytes already in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            origin: Origin::Memory(data.into()),
            identifier: "memory".to_string(),
            decoded: OnceLock::new(),
        }
    }

    /// Source backed by a byte stream, read to the end up front.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, SourceError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self {
            origin: Origin::Memory(Bytes::from(data)),
            identifier: "stream".to_string(),
            decoded: OnceLock::new(),
        })
    }

    fn decode_full(&self) -> Result<RgbaImage, SourceError> {
        let image = match &self.origin {
            Origin::Path(path) => {
                let reader = ImageReader::open(path)?.with_guessed_format()?;
                if reader.format().is_none() {
                    return Err(SourceError::UnsupportedFormat {
                        reason: format!("unrecognized image format: {}", path.display()),
                    });
                }
                reader.decode()?
            }
            Origin::Memory(data) => {
                let reader = ImageReader::new(Cursor::new(data.clone())).with_guessed_format()?;
                if reader.format().is_none() {
                    return Err(SourceError::UnsupportedFormat {
                        reason: "unrecognized image format in byte stream".to_string(),
                    });
                }
                reader.decode()?
            }
        };

        let image = image.into_rgba8();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SourceError::InvalidDimensions { width, height });
        }

        debug!(source = %self.identifier, width, height, "decoded source image");
        Ok(image)
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.origin {
            Origin::Path(_) => "path",
            Origin::Memory(_) => "memory",
        };
        f.debug_struct("ImageSource")
            .field("kind", &kind)
            .field("identifier", &self.identifier)
            .finish()
    }
}

impl DecoderSource for ImageSource {
    type Decoder = ImageRegionDecoder;

    fn open(&self) -> Result<ImageRegionDecoder, SourceError> {
        if let Some(image) = self.decoded.get() {
            return Ok(ImageRegionDecoder {
                image: Arc::clone(image),
            });
        }

        let image = self.decode_full()?;
        let image = Arc::clone(self.decoded.get_or_init(|| Arc::new(image)));
        Ok(ImageRegionDecoder { image })
    }

    fn can_reopen(&self) -> bool {
        matches!(self.origin, Origin::Path(_))
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Image Region Decoder
// =============================================================================

/// Region decoder over a fully decoded `image` buffer.
///
/// The `image` crate has no partial JPEG/PNG decoding, so handles serve
/// regions by cropping and resampling one decoded buffer. Handles opened
/// from the same [`ImageSource`] share that buffer.
pub struct ImageRegionDecoder {
    image: Arc<RgbaImage>,
}

impl ImageRegionDecoder {
    /// Wrap an already decoded image.
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// The decoded pixels behind this handle.
    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }
}

impl RegionDecoder for ImageRegionDecoder {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn decode_region(
        &mut self,
        region: PixelRegion,
        sample_size: u32,
    ) -> Result<RgbaImage, DecodeError> {
        let (width, height) = self.image.dimensions();
        if region.is_empty() || region.right > width || region.bottom > height {
            return Err(DecodeError::Failed {
                message: format!(
                    "region {:?} is outside image bounds {}x{}",
                    region, width, height
                ),
            });
        }

        let cropped = imageops::crop_imm(
            self.image.as_ref(),
            region.left,
            region.top,
            region.width(),
            region.height(),
        )
        .to_image();

        if sample_size <= 1 {
            return Ok(cropped);
        }

        let (out_width, out_height) = region.sampled_size(sample_size);
        Ok(imageops::resize(
            &cropped,
            out_width,
            out_height,
            FilterType::Triangle,
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
