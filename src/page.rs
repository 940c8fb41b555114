//! Traits a page backend implements so it can be captured
//!
//! Each trait covers one concern of the page the capture pipeline needs to
//! touch. Backends usually implement all of them on a single type, which then
//! satisfies [`CaptureTarget`] through the blanket impl.

use crate::geometry::PageMetrics;
use crate::Result;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A pixel image of whatever was visible in the viewport.
#[derive(Debug, Clone)]
pub struct Tile {
    pub image: RgbaImage,
}

impl Tile {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decode an encoded screenshot (PNG from most providers).
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| crate::Error::Other(format!("Failed to decode snapshot: {}", e)))?
            .to_rgba8();
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// One inline style property overwritten on a page element.
///
/// `element` is a handle assigned by the backend; `value` is the inline value
/// that was in place before (empty when none was set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedStyle {
    pub element: u32,
    pub property: String,
    pub value: String,
}

/// Reads page dimensions and the current scroll position.
pub trait GeometryProvider {
    fn metrics(&mut self) -> Result<PageMetrics>;
}

/// Takes a snapshot of the viewport as currently rendered.
pub trait SnapshotProvider {
    fn snapshot(&mut self) -> Result<Tile>;
}

/// Moves the viewport. Must jump immediately, never animate.
pub trait ScrollController {
    fn scroll_to(&mut self, x: f64, y: f64) -> Result<()>;
}

/// Hides and re-shows overlay UI that must not appear in captures.
pub trait UiSuppressor {
    fn hide(&mut self) -> Result<Vec<SavedStyle>>;
    fn show(&mut self, hidden: &[SavedStyle]) -> Result<()>;
}

/// Temporarily rewrites page styles that would break a tiled capture.
pub trait StyleNeutralizer {
    /// Turn `position: fixed|sticky` elements into absolutely positioned
    /// ones so they appear once instead of in every tile.
    fn neutralize_fixed(&mut self) -> Result<Vec<SavedStyle>>;

    /// Force instant scrolling and hide the document scrollbars.
    fn lock_scrolling(&mut self) -> Result<Vec<SavedStyle>>;

    /// Put back inline styles recorded by the two methods above.
    fn restore_styles(&mut self, saved: &[SavedStyle]) -> Result<()>;
}

/// Everything the orchestrator needs from a page.
pub trait CaptureTarget:
    GeometryProvider + SnapshotProvider + ScrollController + UiSuppressor + StyleNeutralizer
{
}

impl<T> CaptureTarget for T where
    T: GeometryProvider + SnapshotProvider + ScrollController + UiSuppressor + StyleNeutralizer
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn tile_decodes_png_bytes() {
        let img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();

        let tile = Tile::from_encoded(buf.get_ref()).unwrap();
        assert_eq!((tile.width(), tile.height()), (4, 3));
        assert_eq!(tile.image.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn tile_rejects_garbage() {
        assert!(Tile::from_encoded(b"not an image").is_err());
    }
}
