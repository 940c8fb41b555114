//! Tile compositor: accumulates viewport tiles into one full-page surface

use crate::geometry::{to_physical, CaptureSegment, PageGeometry};
use crate::page::Tile;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::borrow::Cow;

/// Rows of one composite step, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// First tile row drawn.
    pub src_y: u32,
    /// Surface row the first drawn tile row lands on.
    pub dst_y: u32,
    /// Number of rows drawn.
    pub rows: u32,
}

impl Placement {
    /// Tile rows skipped because an earlier tile already covers them.
    pub fn discarded(&self) -> u32 {
        self.src_y
    }
}

/// Owns the composite surface for one capture.
///
/// Tiles are drawn top to bottom. Each one only fills rows below what is
/// already on the surface, so consecutive tiles may overlap but the drawn
/// regions never do.
pub struct TileCompositor {
    geometry: PageGeometry,
    surface: RgbaImage,
    tile_height: u32,
    /// First surface row not yet drawn.
    filled: u32,
}

impl TileCompositor {
    pub fn new(geometry: PageGeometry) -> Self {
        let (width, height) = geometry.surface_size();
        Self {
            geometry,
            surface: RgbaImage::new(width, height),
            tile_height: geometry.nominal_tile_height(),
            filled: 0,
        }
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Rows from the top of the surface that have been drawn so far.
    pub fn filled_rows(&self) -> u32 {
        self.filled
    }

    /// Give up ownership of the surface, typically to the encoder.
    pub fn into_surface(self) -> RgbaImage {
        self.surface
    }

    /// Where the rows of a nominal-height tile for `segment` belong.
    pub fn placement(&self, segment: &CaptureSegment) -> Placement {
        let surface_height = self.surface.height();
        let tile_height = self.tile_height;

        // At maximum scroll the viewport bottom is the document bottom.
        let start = if segment.is_last && segment.target_scroll_y > 0 {
            surface_height.saturating_sub(tile_height)
        } else {
            to_physical(segment.target_scroll_y, self.geometry.dpr)
        };

        let src_y = self.filled.saturating_sub(start).min(tile_height);
        let dst_y = start + src_y;
        Placement {
            src_y,
            dst_y,
            rows: (tile_height - src_y).min(surface_height.saturating_sub(dst_y)),
        }
    }

    /// Draw `tile` for `segment` onto the surface, clipped to its bounds.
    ///
    /// A tile whose size differs from the nominal tile is resampled first.
    pub fn composite(&mut self, segment: &CaptureSegment, tile: &Tile) -> Placement {
        let placement = self.placement(segment);
        if placement.rows == 0 {
            return placement;
        }
        if placement.dst_y > self.filled {
            log::warn!(
                "segment {} starts at row {} but only {} rows are filled",
                segment.index,
                placement.dst_y,
                self.filled
            );
        }

        let width = self.surface.width();
        let image: Cow<'_, RgbaImage> = if tile.image.dimensions() == (width, self.tile_height) {
            Cow::Borrowed(&tile.image)
        } else {
            log::debug!(
                "resampling {}x{} tile to {}x{}",
                tile.width(),
                tile.height(),
                width,
                self.tile_height
            );
            Cow::Owned(imageops::resize(
                &tile.image,
                width,
                self.tile_height,
                FilterType::Nearest,
            ))
        };

        let rows = imageops::crop_imm(&*image, 0, placement.src_y, width, placement.rows)
            .to_image();
        imageops::replace(&mut self.surface, &rows, 0, placement.dst_y as i64);
        self.filled = self.filled.max(placement.dst_y + placement.rows);

        log::debug!(
            "segment {} drew {} rows at y={} (skipped {})",
            segment.index,
            placement.rows,
            placement.dst_y,
            placement.discarded()
        );
        placement
    }
}
