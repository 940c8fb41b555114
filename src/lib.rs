//! RFox Stitch
//!
//! Full-page screenshot capture for headless browsers. A page taller than its
//! viewport is captured by scrolling through it one viewport at a time,
//! snapshotting each position and compositing the tiles into a single
//! lossless PNG.
//!
//! # Features
//!
//! - **Backend traits**: any page that can report its geometry, scroll,
//!   snapshot and toggle a few styles can be captured (see [`page`])
//! - **CDP Backend** (`cdp` feature): headless Chrome through `headless_chrome`
//! - **Synthetic Backend**: deterministic in-memory page for tests and demos
//! - **Safe Defaults**: oversized surfaces are rejected up front and the page
//!   is always put back the way it was found
//!
//! # Example
//!
//! ```
//! use rfstitch::{CaptureConfig, Capturer, synthetic::SyntheticPage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let capturer = Capturer::new(CaptureConfig::instant())?;
//! let mut page = SyntheticPage::new(320, 2000, 480, 2.0);
//! let image = capturer.capture_full_page(&mut page)?;
//! assert_eq!((image.width, image.height), (640, 4000));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod compositor;
pub mod encoder;
pub mod environment;
pub mod geometry;
pub mod guard;
pub mod page;
pub mod synthetic;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly capture API (worker-thread backed)
pub mod async_api;

pub use async_api::AsyncCapturer;
pub use capture::{CancellationToken, CaptureProgress, CaptureState, Capturer, FailureKind};
pub use encoder::EncodedImage;
pub use geometry::{CaptureSegment, PageGeometry, PageMetrics};
pub use guard::SurfaceLimits;
pub use page::{CaptureTarget, SavedStyle, Tile};

/// How tiles whose height differs from `viewport_height * dpr` are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TilePolicy {
    /// Fail with `TileMismatch` when a tile is more than 1px off.
    #[default]
    Strict,
    /// Accept any size and resample each tile to the nominal tile size
    /// before it is drawn.
    Proportional,
}

/// Configuration for a [`Capturer`]
///
/// The defaults mirror what browsers need in practice: a 300ms settle wait
/// after each scroll so lazy layout and paint can finish, and the 16384px /
/// 268M pixel bitmap limits.
///
/// # Examples
///
/// ```
/// let cfg = rfstitch::CaptureConfig::default();
/// assert_eq!(cfg.settle_delay_ms, 300);
/// assert_eq!(cfg.limits.max_dimension, 16384);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Wait after each scroll before snapshotting, in milliseconds
    pub settle_delay_ms: u64,
    /// Wait after hiding overlays and neutralizing styles, in milliseconds
    pub prepare_delay_ms: u64,
    /// Wait after hiding overlays for a visible-only capture, in milliseconds
    pub visible_delay_ms: u64,
    /// Composite surface limits
    pub limits: SurfaceLimits,
    /// Handling of tiles that do not match the nominal height
    pub tile_policy: TilePolicy,
    /// Filename prefix of full-page captures
    pub filename_prefix: String,
    /// Filename prefix of visible-only captures
    pub visible_prefix: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            prepare_delay_ms: 150,
            visible_delay_ms: 100,
            limits: SurfaceLimits::default(),
            tile_policy: TilePolicy::Strict,
            filename_prefix: "fullpage".to_string(),
            visible_prefix: "visible".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Defaults with every delay set to zero; for backends that render
    /// synchronously.
    pub fn instant() -> Self {
        Self {
            settle_delay_ms: 0,
            prepare_delay_ms: 0,
            visible_delay_ms: 0,
            ..Default::default()
        }
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::ConfigError(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.max_dimension == 0 || self.limits.max_pixels == 0 {
            return Err(Error::ConfigError("surface limits must be non-zero".into()));
        }
        for prefix in [&self.filename_prefix, &self.visible_prefix] {
            if prefix.is_empty() || prefix.contains(['/', '\\']) {
                return Err(Error::ConfigError(format!(
                    "filename prefix {:?} is not usable",
                    prefix
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.prepare_delay_ms, 150);
        assert_eq!(config.limits.max_pixels, 268_435_456);
        assert_eq!(config.tile_policy, TilePolicy::Strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_config() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"settle_delay_ms": 50, "tile_policy": "proportional"}"#)
                .unwrap();
        assert_eq!(config.settle_delay_ms, 50);
        assert_eq!(config.tile_policy, TilePolicy::Proportional);
        assert_eq!(config.filename_prefix, "fullpage");
    }

    #[test]
    fn test_invalid_config() {
        let config = CaptureConfig {
            filename_prefix: "a/b".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
        assert!(Capturer::new(config).is_err());
    }
}
