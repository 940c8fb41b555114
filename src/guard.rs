//! Pre-flight check of the composite surface against bitmap size limits

use crate::geometry::PageGeometry;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Per-dimension limit of common bitmap surfaces.
pub const MAX_DIMENSION: u32 = 16384;
/// Total pixel limit of common bitmap surfaces (16384 * 16384).
pub const MAX_PIXELS: u64 = 268_435_456;

/// Size limits applied to the composite surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl SurfaceLimits {
    /// Fail with `SurfaceTooLarge` when the physical surface for `geometry`
    /// would exceed either dimension limit or the total pixel limit.
    pub fn validate(&self, geometry: &PageGeometry) -> Result<()> {
        let (w, h) = geometry.physical_size();
        let max_dim = self.max_dimension as f64;
        if w > max_dim || h > max_dim || w * h > self.max_pixels as f64 {
            return Err(Error::SurfaceTooLarge {
                width: w.round() as u64,
                height: h.round() as u64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(viewport_width: u32, scroll_height: u32, dpr: f64) -> PageGeometry {
        PageGeometry {
            scroll_width: viewport_width,
            scroll_height,
            viewport_width,
            viewport_height: 800,
            dpr,
        }
    }

    #[test]
    fn rejects_tall_page_at_high_dpr() {
        let err = SurfaceLimits::default()
            .validate(&geom(1000, 20000, 2.0))
            .unwrap_err();
        match err {
            Error::SurfaceTooLarge { width, height } => {
                assert_eq!(width, 2000);
                assert_eq!(height, 40000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn accepts_exact_limit() {
        assert!(SurfaceLimits::default().validate(&geom(8192, 8192, 2.0)).is_ok());
        assert!(SurfaceLimits::default().validate(&geom(8193, 100, 2.0)).is_err());
    }

    #[test]
    fn total_pixel_limit_applies_independently() {
        let limits = SurfaceLimits {
            max_dimension: 16384,
            max_pixels: 1_000_000,
        };
        assert!(limits.validate(&geom(1000, 1000, 1.0)).is_ok());
        assert!(limits.validate(&geom(1000, 1001, 1.0)).is_err());
    }
}
