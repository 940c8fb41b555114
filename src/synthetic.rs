//! A deterministic in-memory page
//!
//! `SyntheticPage` implements every page trait without a browser. Its pixels
//! are a pure function of the page row, so a correctly stitched capture can be
//! compared against [`SyntheticPage::expected_surface`]. It can also carry a
//! fixed header and an overlay, and inject failures, which makes it the
//! backend used by unit tests, benches and the `--synthetic` CLI mode.

use crate::geometry::{to_physical, PageGeometry, PageMetrics};
use crate::page::{
    GeometryProvider, SavedStyle, ScrollController, SnapshotProvider, StyleNeutralizer, Tile,
    UiSuppressor,
};
use crate::{Error, Result};
use image::{Rgba, RgbaImage};

const ROOT: u32 = 0;
const OVERLAY: u32 = 1;
const HEADER: u32 = 2;

/// Colour of the fixed header.
pub const HEADER_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);
/// Colour of the overlay strip drawn along the right edge of the viewport.
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// Colour below the end of the document.
pub const BACKGROUND_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

const OVERLAY_WIDTH_CSS: u32 = 8;

/// How often each page operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyntheticCounters {
    pub metrics: usize,
    pub snapshots: usize,
    pub scrolls: usize,
    pub hides: usize,
    pub shows: usize,
    pub neutralizes: usize,
    pub style_restores: usize,
}

#[derive(Debug, Clone)]
pub struct SyntheticPage {
    geometry: PageGeometry,
    scroll: (f64, f64),
    scroll_history: Vec<(f64, f64)>,
    header_css: Option<u32>,
    overlay_visible: Option<bool>,
    fixed_neutralized: bool,
    scroll_locked: bool,
    tile_scale: f64,
    fail_snapshot_at: Option<usize>,
    fail_neutralize: bool,
    counters: SyntheticCounters,
}

/// Colour of physical page row `y`, column `x`.
pub fn page_pixel(x: u32, y: u32) -> Rgba<u8> {
    Rgba([(y % 256) as u8, ((y / 256) % 256) as u8, (x % 128) as u8, 255])
}

impl SyntheticPage {
    /// A page `scroll_height` CSS px tall seen through a
    /// `viewport_width x viewport_height` viewport.
    pub fn new(viewport_width: u32, scroll_height: u32, viewport_height: u32, dpr: f64) -> Self {
        Self::from_geometry(PageGeometry {
            scroll_width: viewport_width,
            scroll_height,
            viewport_width,
            viewport_height,
            dpr,
        })
    }

    pub fn from_geometry(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            scroll: (0.0, 0.0),
            scroll_history: Vec::new(),
            header_css: None,
            overlay_visible: None,
            fixed_neutralized: false,
            scroll_locked: false,
            tile_scale: 1.0,
            fail_snapshot_at: None,
            fail_neutralize: false,
            counters: SyntheticCounters::default(),
        }
    }

    /// Add a `position: fixed` header `height_css` tall.
    pub fn with_fixed_header(mut self, height_css: u32) -> Self {
        self.header_css = Some(height_css);
        self
    }

    /// Add overlay UI that must be hidden during capture.
    pub fn with_overlay(mut self) -> Self {
        self.overlay_visible = Some(true);
        self
    }

    /// Return tiles scaled by `scale` relative to the nominal tile height.
    pub fn with_tile_scale(mut self, scale: f64) -> Self {
        self.tile_scale = scale;
        self
    }

    /// Make the `call`-th snapshot (0-based) fail.
    pub fn fail_snapshot_at(mut self, call: usize) -> Self {
        self.fail_snapshot_at = Some(call);
        self
    }

    pub fn fail_neutralize(mut self) -> Self {
        self.fail_neutralize = true;
        self
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.scroll = (x, y);
    }

    pub fn scroll_position(&self) -> (f64, f64) {
        self.scroll
    }

    /// Every position passed to `scroll_to`, in order.
    pub fn scroll_history(&self) -> &[(f64, f64)] {
        &self.scroll_history
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible.unwrap_or(false)
    }

    pub fn fixed_neutralized(&self) -> bool {
        self.fixed_neutralized
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn counters(&self) -> SyntheticCounters {
        self.counters
    }

    /// What a perfect full-page capture of this page looks like: document
    /// pixels, header once at the top, no overlay.
    pub fn expected_surface(&self) -> RgbaImage {
        let (w, h) = self.geometry.surface_size();
        let header_px = self.header_css.map(|c| to_physical(c, self.geometry.dpr));
        RgbaImage::from_fn(w, h, |x, y| match header_px {
            Some(hp) if y < hp => HEADER_COLOR,
            _ => page_pixel(x, y),
        })
    }

    fn max_scroll_y(&self) -> f64 {
        self.geometry
            .scroll_height
            .saturating_sub(self.geometry.viewport_height) as f64
    }

    fn render_viewport(&self) -> RgbaImage {
        let g = &self.geometry;
        let width = to_physical(g.viewport_width, g.dpr);
        let height = (g.nominal_tile_height() as f64 * self.tile_scale).round() as u32;
        let page_px = to_physical(g.scroll_height, g.dpr);
        let max_scroll = self.max_scroll_y();
        // Scrolled all the way down, the viewport ends at the page bottom.
        let top = if max_scroll > 0.0 && self.scroll.1 >= max_scroll {
            page_px.saturating_sub(g.nominal_tile_height())
        } else {
            (self.scroll.1 * g.dpr).round() as u32
        };
        let header_px = self.header_css.map(|c| to_physical(c, g.dpr));
        let overlay_from = width.saturating_sub(to_physical(OVERLAY_WIDTH_CSS, g.dpr));
        let overlay = self.overlay_visible();
        let neutralized = self.fixed_neutralized;
        let scale = self.tile_scale;

        RgbaImage::from_fn(width, height, |x, row| {
            if overlay && x >= overlay_from {
                return OVERLAY_COLOR;
            }
            let viewport_row = (row as f64 / scale).floor() as u32;
            let y = top + viewport_row;
            if let Some(hp) = header_px {
                let covered = if neutralized { y < hp } else { viewport_row < hp };
                if covered {
                    return HEADER_COLOR;
                }
            }
            if y >= page_px {
                BACKGROUND_COLOR
            } else {
                page_pixel(x, y)
            }
        })
    }
}

impl GeometryProvider for SyntheticPage {
    fn metrics(&mut self) -> Result<PageMetrics> {
        self.counters.metrics += 1;
        Ok(PageMetrics {
            geometry: self.geometry,
            scroll_x: self.scroll.0,
            scroll_y: self.scroll.1,
        })
    }
}

impl SnapshotProvider for SyntheticPage {
    fn snapshot(&mut self) -> Result<Tile> {
        let call = self.counters.snapshots;
        self.counters.snapshots += 1;
        if self.fail_snapshot_at == Some(call) {
            return Err(Error::Other(format!("injected snapshot failure on call {}", call)));
        }
        Ok(Tile::new(self.render_viewport()))
    }
}

impl ScrollController for SyntheticPage {
    fn scroll_to(&mut self, x: f64, y: f64) -> Result<()> {
        self.counters.scrolls += 1;
        self.scroll_history.push((x, y));
        self.scroll = (x.max(0.0), y.clamp(0.0, self.max_scroll_y()));
        Ok(())
    }
}

impl UiSuppressor for SyntheticPage {
    fn hide(&mut self) -> Result<Vec<SavedStyle>> {
        self.counters.hides += 1;
        match self.overlay_visible {
            Some(true) => {
                self.overlay_visible = Some(false);
                Ok(vec![SavedStyle {
                    element: OVERLAY,
                    property: "display".into(),
                    value: String::new(),
                }])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn show(&mut self, hidden: &[SavedStyle]) -> Result<()> {
        self.counters.shows += 1;
        if hidden.iter().any(|s| s.element == OVERLAY) {
            self.overlay_visible = Some(true);
        }
        Ok(())
    }
}

impl StyleNeutralizer for SyntheticPage {
    fn neutralize_fixed(&mut self) -> Result<Vec<SavedStyle>> {
        self.counters.neutralizes += 1;
        if self.fail_neutralize {
            return Err(Error::EnvironmentError("injected neutralize failure".into()));
        }
        if self.header_css.is_none() {
            return Ok(Vec::new());
        }
        self.fixed_neutralized = true;
        Ok(vec![
            SavedStyle {
                element: HEADER,
                property: "position".into(),
                value: String::new(),
            },
            SavedStyle {
                element: HEADER,
                property: "top".into(),
                value: String::new(),
            },
        ])
    }

    fn lock_scrolling(&mut self) -> Result<Vec<SavedStyle>> {
        self.scroll_locked = true;
        Ok(vec![
            SavedStyle {
                element: ROOT,
                property: "scroll-behavior".into(),
                value: "smooth".into(),
            },
            SavedStyle {
                element: ROOT,
                property: "overflow".into(),
                value: String::new(),
            },
        ])
    }

    fn restore_styles(&mut self, saved: &[SavedStyle]) -> Result<()> {
        self.counters.style_restores += 1;
        for s in saved {
            match s.element {
                ROOT => self.scroll_locked = false,
                HEADER => self.fixed_neutralized = false,
                _ => {}
            }
        }
        Ok(())
    }
}
