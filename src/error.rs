use thiserror::Error;

/// Errors that can occur when attaching an image source.
///
/// These are fatal to the source being attached and are surfaced to the
/// caller once. There is no automatic retry.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source could not be read (missing file, permission, truncated stream)
    #[error("I/O error: {0}")]
    Io(String),

    /// The source is not in a format the region decoder understands
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// The source was readable but its pixel data could not be decoded
    #[error("Failed to decode source: {message}")]
    Decode { message: String },

    /// The source reports an empty image
    #[error("Source has invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err.to_string())
    }
}

impl From<image::ImageError> for SourceError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => SourceError::Io(e.to_string()),
            image::ImageError::Unsupported(e) => SourceError::UnsupportedFormat {
                reason: e.to_string(),
            },
            other => SourceError::Decode {
                message: other.to_string(),
            },
        }
    }
}

/// Errors for a single tile decode.
///
/// These never leave the worker pool: they are logged and the tile is
/// treated as absent, so a later request for the same key may retry.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The region decoder failed on this region
    #[error("Region decode failed: {message}")]
    Failed { message: String },

    /// The decode panicked inside the worker
    #[error("Decode worker panicked")]
    WorkerPanicked,
}

/// Configuration validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Viewport string was not of the form `WIDTHxHEIGHT`
    #[error("Invalid viewport '{0}': expected WIDTHxHEIGHT, e.g. 1280x720")]
    InvalidViewport(String),

    /// A numeric option is out of its accepted range
    #[error("{name} must be {expected}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
    },

    /// pan-x and pan-y must be given together
    #[error("--pan-x and --pan-y must be given together")]
    PartialPan,
}
