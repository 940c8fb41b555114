//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a page
#[derive(Error, Debug)]
pub enum Error {
    /// The composite surface would exceed the platform bitmap limits.
    /// Raised before any scrolling or snapshotting.
    #[error("Page is too large to capture ({width}x{height}px)")]
    SurfaceTooLarge { width: u64, height: u64 },

    /// The page metrics cannot be captured (zero-sized viewport, bad ratio...)
    #[error("Invalid page geometry: {0}")]
    InvalidGeometry(String),

    /// A snapshot or scroll failed part-way through the sequence
    #[error("Capture failed at segment {segment}: {reason}")]
    CaptureFailed { segment: usize, reason: String },

    /// A tile's height does not match the nominal viewport height
    #[error("Tile for segment {segment} is {actual}px tall, expected {expected}px")]
    TileMismatch {
        segment: usize,
        expected: u32,
        actual: u32,
    },

    /// Serializing the finished surface failed
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    /// The capture was cancelled between segments
    #[error("Capture cancelled")]
    Cancelled,

    /// Hiding overlays, neutralizing styles or restoring them failed
    #[error("Page environment error: {0}")]
    EnvironmentError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error was raised before the page was touched.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::SurfaceTooLarge { .. } | Error::InvalidGeometry(_) | Error::ConfigError(_)
        )
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_too_large_message_has_dimensions() {
        let e = Error::SurfaceTooLarge {
            width: 2000,
            height: 40000,
        };
        assert_eq!(e.to_string(), "Page is too large to capture (2000x40000px)");
        assert!(e.is_preflight());
    }

    #[test]
    fn capture_failed_is_not_preflight() {
        let e = Error::CaptureFailed {
            segment: 3,
            reason: "tab crashed".into(),
        };
        assert!(!e.is_preflight());
        assert!(e.to_string().contains("segment 3"));
    }
}
