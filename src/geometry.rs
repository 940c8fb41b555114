//! Page geometry and the scroll schedule derived from it

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Dimensions of a page in CSS pixels, plus its device pixel ratio.
///
/// Read once when a capture starts and treated as immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub scroll_width: u32,
    pub scroll_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub dpr: f64,
}

/// Geometry together with the scroll position at the time it was read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub geometry: PageGeometry,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

/// One viewport-sized step of a full-page capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSegment {
    pub index: usize,
    /// Scroll offset in CSS pixels the viewport is moved to.
    pub target_scroll_y: u32,
    pub is_last: bool,
}

impl PageGeometry {
    /// Reject metrics the pipeline cannot work with.
    pub fn check(&self) -> Result<()> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(Error::InvalidGeometry(format!(
                "viewport is {}x{}",
                self.viewport_width, self.viewport_height
            )));
        }
        if self.scroll_height == 0 {
            return Err(Error::InvalidGeometry("page has no height".into()));
        }
        if !self.dpr.is_finite() || self.dpr <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "device pixel ratio {} is not usable",
                self.dpr
            )));
        }
        Ok(())
    }

    /// Physical surface size before rounding, as `(width, height)`.
    pub fn physical_size(&self) -> (f64, f64) {
        (
            self.viewport_width as f64 * self.dpr,
            self.scroll_height as f64 * self.dpr,
        )
    }

    /// Pixel dimensions of the composite surface.
    pub fn surface_size(&self) -> (u32, u32) {
        let (w, h) = self.physical_size();
        (w.round() as u32, h.round() as u32)
    }

    /// Nominal height of one tile in physical pixels.
    pub fn nominal_tile_height(&self) -> u32 {
        to_physical(self.viewport_height, self.dpr)
    }

    /// CSS distance between the starts of consecutive segments.
    ///
    /// This is the viewport height, unless `viewport_height * dpr` rounds
    /// down to the tile height. Stepping a full viewport would then open a
    /// row between physical tiles, so the step shrinks until each tile
    /// overlaps the previous one by at least a row.
    pub fn scroll_step(&self) -> u32 {
        let tile = self.nominal_tile_height();
        if self.viewport_height as f64 * self.dpr <= tile as f64 + EPSILON {
            return self.viewport_height;
        }
        let fit = (tile.saturating_sub(1) as f64 / self.dpr + EPSILON).floor() as u32;
        fit.clamp(1, self.viewport_height)
    }

    pub fn segment_count(&self) -> usize {
        if self.scroll_height <= self.viewport_height {
            return 1;
        }
        1 + (self.scroll_height - self.viewport_height).div_ceil(self.scroll_step()) as usize
    }

    /// CSS rows the clamped last segment adds beyond a whole number of steps.
    pub fn remainder(&self) -> u32 {
        self.scroll_height
            .saturating_sub(self.viewport_height)
            % self.scroll_step()
    }

    /// Whether the last segment is clamped back over the one before it.
    pub fn has_overlap(&self) -> bool {
        self.segment_count() > 1 && self.remainder() != 0
    }

    /// Scroll schedule: one segment per step, the last one clamped so it
    /// ends exactly at the bottom edge of the page.
    pub fn schedule(&self) -> Vec<CaptureSegment> {
        let count = self.segment_count();
        let step = self.scroll_step();
        (0..count)
            .map(|index| {
                let is_last = index + 1 == count;
                let target_scroll_y = if is_last {
                    self.scroll_height.saturating_sub(self.viewport_height)
                } else {
                    index as u32 * step
                };
                CaptureSegment {
                    index,
                    target_scroll_y,
                    is_last,
                }
            })
            .collect()
    }
}

const EPSILON: f64 = 1e-6;

/// Convert a CSS length to physical pixels.
pub fn to_physical(css: u32, dpr: f64) -> u32 {
    (css as f64 * dpr).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(scroll_height: u32, viewport_height: u32) -> PageGeometry {
        PageGeometry {
            scroll_width: 800,
            scroll_height,
            viewport_width: 800,
            viewport_height,
            dpr: 1.0,
        }
    }

    #[test]
    fn short_page_is_one_segment_at_top() {
        let s = geom(300, 600).schedule();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].target_scroll_y, 0);
        assert!(s[0].is_last);
        assert!(!geom(300, 600).has_overlap());
    }

    #[test]
    fn exact_multiple_has_no_clamp() {
        let g = geom(1800, 600);
        let ys: Vec<u32> = g.schedule().iter().map(|s| s.target_scroll_y).collect();
        assert_eq!(ys, vec![0, 600, 1200]);
        assert!(!g.has_overlap());
    }

    #[test]
    fn remainder_clamps_last_segment_to_bottom() {
        let g = geom(1450, 600);
        let s = g.schedule();
        assert_eq!(s.len(), 3);
        assert_eq!(s[1].target_scroll_y, 600);
        assert_eq!(s[2].target_scroll_y, 850);
        assert!(s[2].is_last && !s[1].is_last);
        assert_eq!(g.remainder(), 250);
        assert!(g.has_overlap());
    }

    #[test]
    fn surface_size_scales_by_dpr() {
        let g = PageGeometry { dpr: 1.5, ..geom(1001, 600) };
        assert_eq!(g.surface_size(), (1200, 1502));
        assert_eq!(g.nominal_tile_height(), 900);
    }

    #[test]
    fn step_shrinks_when_tile_height_rounds_down() {
        // 91 * 1.1 = 100.1 css rows fit in a 100 row tile.
        let g = PageGeometry { dpr: 1.1, ..geom(1000, 91) };
        assert_eq!(g.nominal_tile_height(), 100);
        assert_eq!(g.scroll_step(), 90);
        let s = g.schedule();
        assert_eq!(s.len(), 12);
        assert_eq!(s[10].target_scroll_y, 900);
        assert_eq!(s[11].target_scroll_y, 909);

        // 91 * 1.5 = 136.5 rounds up, so a full viewport step is safe.
        let g = PageGeometry { dpr: 1.5, ..geom(1000, 91) };
        assert_eq!(g.scroll_step(), 91);
        assert_eq!(g.segment_count(), 11);
    }

    #[test]
    fn consecutive_tiles_never_leave_a_gap() {
        for (vh, dpr) in [(91, 1.1), (641, 1.25), (333, 1.3), (600, 1.5), (97, 2.75)] {
            let g = PageGeometry { dpr, ..geom(5000, vh) };
            let tile = g.nominal_tile_height();
            let s = g.schedule();
            for pair in s[..s.len() - 1].windows(2) {
                let end = to_physical(pair[0].target_scroll_y, dpr) + tile;
                let next = to_physical(pair[1].target_scroll_y, dpr);
                assert!(next <= end, "vh {vh} dpr {dpr}: {next} > {end}");
            }
        }
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        assert!(geom(0, 600).check().is_err());
        assert!(geom(600, 0).check().is_err());
        assert!(PageGeometry { dpr: 0.0, ..geom(600, 600) }.check().is_err());
        assert!(PageGeometry { dpr: f64::NAN, ..geom(600, 600) }.check().is_err());
        assert!(geom(600, 600).check().is_ok());
    }
}
