//! Scoped ownership of the page state a capture has to disturb
//!
//! A capture scrolls the page, hides overlay UI and rewrites fixed/sticky
//! styles. [`EnvironmentGuard`] records all of it on acquisition and puts it
//! back exactly once, either through [`EnvironmentGuard::release`] or, if the
//! guard is dropped without being released, from `Drop`.

use crate::page::{CaptureTarget, SavedStyle};
use crate::{Error, Result};
use std::ops::{Deref, DerefMut};

/// Page state recorded before a capture modifies it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientEnvironmentSnapshot {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub hidden_ui: Vec<SavedStyle>,
    pub neutralized: Vec<SavedStyle>,
    pub scroll_lock: Vec<SavedStyle>,
}

/// Exclusive access to a target whose environment has been prepared for
/// capture. Derefs to the target.
pub struct EnvironmentGuard<'a, T: CaptureTarget + ?Sized> {
    target: &'a mut T,
    snapshot: AmbientEnvironmentSnapshot,
    released: bool,
}

impl<'a, T: CaptureTarget + ?Sized> EnvironmentGuard<'a, T> {
    /// Hide overlays, neutralize fixed elements and lock scrolling.
    ///
    /// `scroll_x`/`scroll_y` are the position to return to afterwards. If a
    /// step fails, whatever was already changed is put back before the error
    /// is returned.
    pub fn acquire(target: &'a mut T, scroll_x: f64, scroll_y: f64) -> Result<Self> {
        let mut guard = Self {
            target,
            snapshot: AmbientEnvironmentSnapshot {
                scroll_x,
                scroll_y,
                ..Default::default()
            },
            released: false,
        };

        guard.snapshot.hidden_ui = guard.target.hide()?;
        guard.snapshot.neutralized = guard.target.neutralize_fixed()?;
        guard.snapshot.scroll_lock = guard.target.lock_scrolling()?;

        log::debug!(
            "environment acquired: {} overlay styles, {} fixed styles, scroll at ({}, {})",
            guard.snapshot.hidden_ui.len(),
            guard.snapshot.neutralized.len(),
            scroll_x,
            scroll_y
        );
        Ok(guard)
    }

    pub fn snapshot(&self) -> &AmbientEnvironmentSnapshot {
        &self.snapshot
    }

    /// Restore the recorded environment. Every step is attempted even if an
    /// earlier one fails; the first failure is reported.
    pub fn release(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let s = &self.snapshot;
        let mut first_err: Option<Error> = None;
        let mut note = |res: Result<()>, what: &str| {
            if let Err(e) = res {
                log::warn!("Failed to restore {}: {}", what, e);
                if first_err.is_none() {
                    first_err = Some(Error::EnvironmentError(format!("{}: {}", what, e)));
                }
            }
        };

        note(self.target.restore_styles(&s.scroll_lock), "scroll lock");
        note(self.target.scroll_to(s.scroll_x, s.scroll_y), "scroll position");
        note(self.target.restore_styles(&s.neutralized), "fixed elements");
        note(self.target.show(&s.hidden_ui), "overlay UI");

        match first_err {
            Some(e) => Err(e),
            None => {
                log::debug!("environment restored");
                Ok(())
            }
        }
    }
}

impl<T: CaptureTarget + ?Sized> Deref for EnvironmentGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: CaptureTarget + ?Sized> DerefMut for EnvironmentGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T: CaptureTarget + ?Sized> Drop for EnvironmentGuard<'_, T> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticPage;

    #[test]
    fn release_restores_everything_once() {
        let mut page = SyntheticPage::new(800, 3000, 600, 1.0)
            .with_fixed_header(40)
            .with_overlay();
        page.set_scroll(0.0, 420.0);

        let guard = EnvironmentGuard::acquire(&mut page, 0.0, 420.0).unwrap();
        assert!(!guard.overlay_visible());
        assert!(guard.fixed_neutralized());
        assert!(guard.scroll_locked());
        guard.release().unwrap();

        assert!(page.overlay_visible());
        assert!(!page.fixed_neutralized());
        assert!(!page.scroll_locked());
        assert_eq!(page.scroll_position(), (0.0, 420.0));
        assert_eq!(page.counters().shows, 1);
        assert_eq!(page.counters().style_restores, 2);
    }

    #[test]
    fn drop_restores_when_not_released() {
        let mut page = SyntheticPage::new(800, 3000, 600, 1.0).with_overlay();
        {
            let mut guard = EnvironmentGuard::acquire(&mut page, 0.0, 0.0).unwrap();
            guard.set_scroll(0.0, 1200.0);
        }
        assert!(page.overlay_visible());
        assert_eq!(page.scroll_position(), (0.0, 0.0));
    }

    #[test]
    fn failed_acquire_puts_back_partial_changes() {
        let mut page = SyntheticPage::new(800, 3000, 600, 1.0)
            .with_overlay()
            .fail_neutralize();
        let err = EnvironmentGuard::acquire(&mut page, 0.0, 0.0).err().unwrap();
        assert!(matches!(err, Error::EnvironmentError(_)));
        assert!(page.overlay_visible());
    }
}
