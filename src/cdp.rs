//! Chrome DevTools Protocol backend
//!
//! `CdpPage` drives a single headless Chrome tab through the
//! `headless_chrome` crate and implements every page trait on it: geometry
//! and styles through page-side scripts, snapshots through
//! `Page.captureScreenshot`.

use crate::geometry::{PageGeometry, PageMetrics};
use crate::page::{
    GeometryProvider, SavedStyle, ScrollController, SnapshotProvider, StyleNeutralizer, Tile,
    UiSuppressor,
};
use crate::{Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Shared helpers installed before every style script. Elements touched by a
/// capture get a numeric `data-rfstitch-el` handle so their styles can be
/// found again on restore.
const PRELUDE: &str = r#"
    window.__rfstitchNext = window.__rfstitchNext || 1;
    function __rfstitchTag(el) {
        var id = el.getAttribute('data-rfstitch-el');
        if (id === null) {
            id = String(window.__rfstitchNext++);
            el.setAttribute('data-rfstitch-el', id);
        }
        return Number(id);
    }
    function __rfstitchSave(out, el, prop, next) {
        out.push({ element: __rfstitchTag(el), property: prop, value: el.style.getPropertyValue(prop) });
        el.style.setProperty(prop, next);
    }
"#;

const METRICS_SCRIPT: &str = r#"(function(){
    var de = document.documentElement, b = document.body;
    return JSON.stringify({
        scroll_width: Math.max(de.scrollWidth, de.offsetWidth, b ? b.scrollWidth : 0, b ? b.offsetWidth : 0),
        scroll_height: Math.max(de.scrollHeight, de.offsetHeight, b ? b.scrollHeight : 0, b ? b.offsetHeight : 0),
        viewport_width: window.innerWidth,
        viewport_height: window.innerHeight,
        dpr: window.devicePixelRatio || 1,
        scroll_x: window.scrollX,
        scroll_y: window.scrollY
    });
})()"#;

const HIDE_SCRIPT: &str = r#"(function(){
    {{PRELUDE}}
    var out = [];
    document.querySelectorAll({{SELECTOR}}).forEach(function(el){
        __rfstitchSave(out, el, 'display', 'none');
    });
    return JSON.stringify(out);
})()"#;

const NEUTRALIZE_SCRIPT: &str = r#"(function(){
    {{PRELUDE}}
    var skip = {{SELECTOR}};
    var out = [];
    document.querySelectorAll('*').forEach(function(el){
        if (skip && el.closest(skip)) return;
        var pos = window.getComputedStyle(el).position;
        if (pos === 'fixed' || pos === 'sticky') {
            __rfstitchSave(out, el, 'top', el.style.getPropertyValue('top'));
            __rfstitchSave(out, el, 'position', 'absolute');
        }
    });
    return JSON.stringify(out);
})()"#;

const LOCK_SCRIPT: &str = r#"(function(){
    {{PRELUDE}}
    var out = [];
    __rfstitchSave(out, document.documentElement, 'scroll-behavior', 'auto');
    __rfstitchSave(out, document.documentElement, 'overflow', 'hidden');
    return JSON.stringify(out);
})()"#;

const RESTORE_SCRIPT: &str = r#"(function(saved){
    var touched = {};
    saved.forEach(function(s){
        var el = document.querySelector('[data-rfstitch-el="' + s.element + '"]');
        if (!el) return;
        if (s.value === '') { el.style.removeProperty(s.property); }
        else { el.style.setProperty(s.property, s.value); }
        touched[s.element] = el;
    });
    Object.keys(touched).forEach(function(k){ touched[k].removeAttribute('data-rfstitch-el'); });
    return saved.length;
})({{SAVED}})"#;

const SCROLL_SCRIPT: &str =
    "window.scrollTo({ left: {{X}}, top: {{Y}}, behavior: 'instant' }); window.scrollY";

/// Configuration for the headless Chrome instance behind a [`CdpPage`]
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// User agent string to send with requests
    pub user_agent: String,
    /// Window size in CSS pixels
    pub viewport: (u32, u32),
    /// Timeout for page loads in milliseconds
    pub timeout_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
    /// CSS selectors of overlay UI hidden during captures
    pub overlay_selectors: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/115.0 RFOX/0.3"
                .to_string(),
            viewport: (1280, 720),
            timeout_ms: 30000,
            headers: HashMap::new(),
            overlay_selectors: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct RawMetrics {
    scroll_width: f64,
    scroll_height: f64,
    viewport_width: f64,
    viewport_height: f64,
    dpr: f64,
    scroll_x: f64,
    scroll_y: f64,
}

impl From<RawMetrics> for PageMetrics {
    fn from(m: RawMetrics) -> Self {
        PageMetrics {
            geometry: PageGeometry {
                scroll_width: m.scroll_width.ceil() as u32,
                scroll_height: m.scroll_height.ceil() as u32,
                viewport_width: m.viewport_width.round() as u32,
                viewport_height: m.viewport_height.round() as u32,
                dpr: m.dpr,
            },
            scroll_x: m.scroll_x,
            scroll_y: m.scroll_y,
        }
    }
}

/// A headless Chrome tab that can be captured.
pub struct CdpPage {
    // Kept alive for as long as the tab is in use; `None` for borrowed tabs.
    browser: Option<Browser>,
    tab: Arc<Tab>,
    overlay_selectors: Vec<String>,
}

impl CdpPage {
    /// Launch headless Chrome and open a tab configured from `config`.
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some(config.viewport))
            .build()
            .map_err(|e| Error::CdpError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::CdpError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::CdpError(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| Error::CdpError(format!("Failed to set user agent: {}", e)))?;

        if !config.headers.is_empty() {
            let headers: HashMap<&str, &str> = config
                .headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            tab.set_extra_http_headers(headers)
                .map_err(|e| Error::CdpError(format!("Failed to set headers: {}", e)))?;
        }

        Ok(Self {
            browser: Some(browser),
            tab,
            overlay_selectors: config.overlay_selectors,
        })
    }

    /// Wrap a tab owned elsewhere.
    pub fn from_tab(tab: Arc<Tab>, overlay_selectors: Vec<String>) -> Self {
        Self {
            browser: None,
            tab,
            overlay_selectors,
        }
    }

    /// Navigate and wait for the page to settle.
    pub fn load_url(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::CdpError(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::CdpError(format!("Wait for navigation failed: {}", e)))?;

        // Wait for the page to stabilize
        std::thread::sleep(Duration::from_millis(500));
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }

    fn selector_literal(&self) -> String {
        serde_json::to_string(&self.overlay_selectors.join(", "))
            .unwrap_or_else(|_| "\"\"".to_string())
    }

    /// Evaluate `script`, which must return a JSON string, and decode it.
    fn eval_json<T: serde::de::DeserializeOwned>(&self, script: &str, what: &str) -> Result<T> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::CdpError(format!("{} failed: {}", what, e)))?;
        let text = remote
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::CdpError(format!("{} returned no value", what)))?;
        serde_json::from_str(text)
            .map_err(|e| Error::CdpError(format!("{} returned malformed JSON: {}", what, e)))
    }

    fn style_script(&self, template: &str, selector: &str) -> String {
        template
            .replace("{{PRELUDE}}", PRELUDE)
            .replace("{{SELECTOR}}", selector)
    }
}

impl GeometryProvider for CdpPage {
    fn metrics(&mut self) -> Result<PageMetrics> {
        let raw: RawMetrics = self.eval_json(METRICS_SCRIPT, "Reading page metrics")?;
        let metrics = PageMetrics::from(raw);
        debug!("page metrics: {:?}", metrics);
        Ok(metrics)
    }
}

impl SnapshotProvider for CdpPage {
    fn snapshot(&mut self) -> Result<Tile> {
        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::CdpError(format!("Screenshot failed: {}", e)))?;
        Tile::from_encoded(&png)
    }
}

impl ScrollController for CdpPage {
    fn scroll_to(&mut self, x: f64, y: f64) -> Result<()> {
        let script = SCROLL_SCRIPT
            .replace("{{X}}", &x.to_string())
            .replace("{{Y}}", &y.to_string());
        self.tab
            .evaluate(&script, false)
            .map_err(|e| Error::CdpError(format!("Scroll failed: {}", e)))?;
        Ok(())
    }
}

impl UiSuppressor for CdpPage {
    fn hide(&mut self) -> Result<Vec<SavedStyle>> {
        if self.overlay_selectors.is_empty() {
            return Ok(Vec::new());
        }
        let script = self.style_script(HIDE_SCRIPT, &self.selector_literal());
        self.eval_json(&script, "Hiding overlays")
            .map_err(|e| Error::EnvironmentError(e.to_string()))
    }

    fn show(&mut self, hidden: &[SavedStyle]) -> Result<()> {
        self.restore_styles(hidden)
    }
}

impl StyleNeutralizer for CdpPage {
    fn neutralize_fixed(&mut self) -> Result<Vec<SavedStyle>> {
        let script = self.style_script(NEUTRALIZE_SCRIPT, &self.selector_literal());
        let saved: Vec<SavedStyle> = self
            .eval_json(&script, "Neutralizing fixed elements")
            .map_err(|e| Error::EnvironmentError(e.to_string()))?;
        debug!("neutralized {} fixed/sticky style properties", saved.len());
        Ok(saved)
    }

    fn lock_scrolling(&mut self) -> Result<Vec<SavedStyle>> {
        let script = self.style_script(LOCK_SCRIPT, "''");
        self.eval_json(&script, "Locking scrolling")
            .map_err(|e| Error::EnvironmentError(e.to_string()))
    }

    fn restore_styles(&mut self, saved: &[SavedStyle]) -> Result<()> {
        if saved.is_empty() {
            return Ok(());
        }
        let json = serde_json::to_string(saved)
            .map_err(|e| Error::EnvironmentError(format!("Failed to serialize styles: {}", e)))?;
        let script = RESTORE_SCRIPT.replace("{{SAVED}}", &json);
        self.tab.evaluate(&script, false).map_err(|e| {
            warn!("Failed to restore page styles: {}", e);
            Error::EnvironmentError(format!("Restoring styles failed: {}", e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_metrics_round_fractional_page_height_up() {
        let raw: RawMetrics = serde_json::from_str(
            r#"{"scroll_width":1280,"scroll_height":4000.5,"viewport_width":1280,
                "viewport_height":720,"dpr":2,"scroll_x":0,"scroll_y":120}"#,
        )
        .unwrap();
        let m = PageMetrics::from(raw);
        assert_eq!(m.geometry.scroll_height, 4001);
        assert_eq!(m.geometry.viewport_height, 720);
        assert_eq!(m.scroll_y, 120.0);
    }

    #[test]
    fn raw_metrics_round_viewport_to_nearest() {
        let raw: RawMetrics = serde_json::from_str(
            r#"{"scroll_width":800,"scroll_height":3000,"viewport_width":799.6,
                "viewport_height":640.7,"dpr":1.25,"scroll_x":0,"scroll_y":0}"#,
        )
        .unwrap();
        let g = PageMetrics::from(raw).geometry;
        assert_eq!((g.viewport_width, g.viewport_height), (800, 641));
    }

    #[test]
    fn test_cdp_page_launch() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        match CdpPage::launch(BrowserConfig::default()) {
            Ok(page) => page.close().unwrap(),
            Err(e) => eprintln!(
                "Skipping CDP launch test because Chrome is not available or failed to launch: {}",
                e
            ),
        }
    }
}
