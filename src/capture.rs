//! Capture orchestration
//!
//! [`Capturer`] drives a full-page capture: it reads the page geometry once,
//! checks the surface size, prepares the page environment, then walks the
//! scroll schedule one segment at a time (scroll, settle, snapshot,
//! composite) before encoding the surface. Segments never overlap in time;
//! the viewport is a single shared resource and the compositor fills the
//! surface strictly top to bottom.

use crate::compositor::TileCompositor;
use crate::encoder::{self, EncodedImage};
use crate::environment::EnvironmentGuard;
use crate::geometry::{CaptureSegment, PageGeometry};
use crate::page::{CaptureTarget, Tile};
use crate::{CaptureConfig, Error, Result, TilePolicy};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type OnProgressHandler = Arc<dyn Fn(&CaptureProgress) + Send + Sync>;

/// Where a capture currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Guarding,
    /// Scrolling to and snapshotting segment `i`
    Capturing(usize),
    /// Drawing segment `i` onto the surface
    Compositing(usize),
    Encoding,
    Done,
    Failed(FailureKind),
}

/// Coarse reason attached to [`CaptureState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SurfaceTooLarge,
    InvalidGeometry,
    Capture,
    TileMismatch,
    Encode,
    Cancelled,
    Environment,
    Other,
}

impl FailureKind {
    pub fn of(err: &Error) -> Self {
        match err {
            Error::SurfaceTooLarge { .. } => FailureKind::SurfaceTooLarge,
            Error::InvalidGeometry(_) => FailureKind::InvalidGeometry,
            Error::CaptureFailed { .. } => FailureKind::Capture,
            Error::TileMismatch { .. } => FailureKind::TileMismatch,
            Error::EncodeFailed(_) => FailureKind::Encode,
            Error::Cancelled => FailureKind::Cancelled,
            Error::EnvironmentError(_) => FailureKind::Environment,
            _ => FailureKind::Other,
        }
    }
}

/// Progress notification passed to `on_progress` handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureProgress {
    pub state: CaptureState,
    /// Segment being captured or composited, if any
    pub segment: Option<usize>,
    /// Number of segments in the schedule (0 until geometry is known)
    pub total: usize,
}

/// Cooperative cancellation flag, checked between capture states.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

enum Step {
    Scroll(usize),
    Snapshot(usize),
    Composite(usize, Tile),
    Encode,
}

/// Runs captures against any [`CaptureTarget`].
pub struct Capturer {
    config: CaptureConfig,
    on_progress: Option<OnProgressHandler>,
}

impl Capturer {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            on_progress: None,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Register a callback invoked on every state transition.
    pub fn on_progress<F>(&mut self, cb: F)
    where
        F: Fn(&CaptureProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(cb));
    }

    pub fn clear_on_progress(&mut self) {
        self.on_progress = None;
    }

    /// Capture the full scrollable extent of the page as one PNG.
    pub fn capture_full_page<T>(&self, target: &mut T) -> Result<EncodedImage>
    where
        T: CaptureTarget + ?Sized,
    {
        self.capture_full_page_cancellable(target, &CancellationToken::new())
    }

    /// Like [`Capturer::capture_full_page`], giving up with
    /// [`Error::Cancelled`] as soon as `cancel` is triggered.
    pub fn capture_full_page_cancellable<T>(
        &self,
        target: &mut T,
        cancel: &CancellationToken,
    ) -> Result<EncodedImage>
    where
        T: CaptureTarget + ?Sized,
    {
        let mut segment_count = 0;
        let result = self.run_full_page(target, cancel, &mut segment_count);
        match &result {
            Ok(image) => {
                info!(
                    "captured {}x{} page in {} segments as {}",
                    image.width, image.height, segment_count, image.filename
                );
                self.emit(CaptureState::Done, segment_count);
            }
            Err(e) => {
                warn!("full-page capture failed: {}", e);
                self.emit(CaptureState::Failed(FailureKind::of(e)), segment_count);
            }
        }
        result
    }

    /// Capture only what is visible in the viewport, with overlays hidden.
    pub fn capture_visible<T>(&self, target: &mut T) -> Result<EncodedImage>
    where
        T: CaptureTarget + ?Sized,
    {
        let hidden = target.hide()?;
        sleep_ms(self.config.visible_delay_ms);

        let result = target
            .snapshot()
            .map_err(|e| Error::CaptureFailed {
                segment: 0,
                reason: e.to_string(),
            })
            .and_then(|tile| encoder::encode(tile.image, &self.config.visible_prefix));

        let shown = target.show(&hidden);
        match (result, shown) {
            (Ok(image), Ok(())) => {
                info!("captured visible viewport as {}", image.filename);
                Ok(image)
            }
            (Ok(_), Err(e)) => Err(Error::EnvironmentError(format!("overlay UI: {}", e))),
            (Err(e), shown) => {
                if let Err(se) = shown {
                    warn!("Failed to show overlay UI after failed capture: {}", se);
                }
                Err(e)
            }
        }
    }

    fn run_full_page<T>(
        &self,
        target: &mut T,
        cancel: &CancellationToken,
        segment_count: &mut usize,
    ) -> Result<EncodedImage>
    where
        T: CaptureTarget + ?Sized,
    {
        self.emit(CaptureState::Guarding, 0);
        check_cancelled(cancel)?;

        let metrics = target.metrics()?;
        let geometry = metrics.geometry;
        geometry.check()?;
        self.config.limits.validate(&geometry)?;

        let schedule = geometry.schedule();
        *segment_count = schedule.len();
        info!(
            "capturing {}x{} css px page at dpr {} in {} segments",
            geometry.viewport_width, geometry.scroll_height, geometry.dpr, schedule.len()
        );

        let mut env = EnvironmentGuard::acquire(target, metrics.scroll_x, metrics.scroll_y)?;
        sleep_ms(self.config.prepare_delay_ms);

        let outcome = self.drive(&mut *env, geometry, &schedule, cancel);
        let restored = env.release();

        match (outcome, restored) {
            (Ok(image), Ok(())) => Ok(image),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), restored) => {
                if let Err(re) = restored {
                    warn!("Environment restore also failed: {}", re);
                }
                Err(e)
            }
        }
    }

    fn drive<T>(
        &self,
        target: &mut T,
        geometry: PageGeometry,
        schedule: &[CaptureSegment],
        cancel: &CancellationToken,
    ) -> Result<EncodedImage>
    where
        T: CaptureTarget + ?Sized,
    {
        let total = schedule.len();
        let mut compositor = TileCompositor::new(geometry);
        let mut step = Step::Scroll(0);

        loop {
            check_cancelled(cancel)?;
            step = match step {
                Step::Scroll(i) => {
                    self.emit(CaptureState::Capturing(i), total);
                    let segment = &schedule[i];
                    target
                        .scroll_to(0.0, segment.target_scroll_y as f64)
                        .map_err(|e| Error::CaptureFailed {
                            segment: i,
                            reason: format!("scroll failed: {}", e),
                        })?;
                    sleep_ms(self.config.settle_delay_ms);
                    Step::Snapshot(i)
                }
                Step::Snapshot(i) => {
                    let tile = target.snapshot().map_err(|e| Error::CaptureFailed {
                        segment: i,
                        reason: e.to_string(),
                    })?;
                    self.check_tile(&geometry, i, &tile)?;
                    Step::Composite(i, tile)
                }
                Step::Composite(i, tile) => {
                    self.emit(CaptureState::Compositing(i), total);
                    compositor.composite(&schedule[i], &tile);
                    if i + 1 < total {
                        Step::Scroll(i + 1)
                    } else {
                        Step::Encode
                    }
                }
                Step::Encode => break,
            };
        }

        self.emit(CaptureState::Encoding, total);
        encoder::encode(compositor.into_surface(), &self.config.filename_prefix)
    }

    fn check_tile(&self, geometry: &PageGeometry, segment: usize, tile: &Tile) -> Result<()> {
        let expected = geometry.nominal_tile_height();
        let actual = tile.height();
        if actual.abs_diff(expected) > 1 {
            match self.config.tile_policy {
                TilePolicy::Strict => {
                    return Err(Error::TileMismatch {
                        segment,
                        expected,
                        actual,
                    })
                }
                TilePolicy::Proportional => {
                    debug!(
                        "segment {} tile is {}px tall (nominal {}px), resampling",
                        segment, actual, expected
                    );
                }
            }
        }
        Ok(())
    }

    fn emit(&self, state: CaptureState, total: usize) {
        debug!("capture state: {:?}", state);
        if let Some(cb) = &self.on_progress {
            let segment = match state {
                CaptureState::Capturing(i) | CaptureState::Compositing(i) => Some(i),
                _ => None,
            };
            cb(&CaptureProgress {
                state,
                segment,
                total,
            });
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn sleep_ms(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}
