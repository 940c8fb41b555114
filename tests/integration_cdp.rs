//! Captures against a real headless Chrome (requires the `cdp` feature)
#![cfg(feature = "cdp")]

use rfstitch::cdp::{BrowserConfig, CdpPage};
use rfstitch::page::GeometryProvider;
use rfstitch::{CaptureConfig, Capturer};
use std::sync::Once;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();

/// Start a test server serving a tall page with a fixed header and an overlay
fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for request in server.incoming_requests() {
                let response = match request.url() {
                    "/" => Response::from_string(
                        r#"<!DOCTYPE html>
<html>
<head><title>Tall Page</title>
<style>
  html, body { margin: 0; scroll-behavior: smooth; }
  header { position: fixed; top: 0; left: 0; right: 0; height: 40px; background: #f0f; }
  #panel { position: fixed; right: 0; top: 0; width: 50px; height: 50px; background: #0f0; }
  .block { height: 250px; }
  .block:nth-child(odd) { background: #333; }
</style></head>
<body>
<header>Header</header>
<div id="panel"></div>
<main>
  <div class="block"></div><div class="block"></div><div class="block"></div>
  <div class="block"></div><div class="block"></div><div class="block"></div>
  <div class="block"></div><div class="block"></div><div class="block"></div>
  <div class="block"></div>
</main>
</body>
</html>"#,
                    )
                    .with_header(
                        "Content-Type: text/html; charset=utf-8"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    ),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090".to_string()
}

fn launch() -> CdpPage {
    let mut page = CdpPage::launch(BrowserConfig {
        viewport: (800, 600),
        overlay_selectors: vec!["#panel".to_string()],
        ..Default::default()
    })
    .expect("Failed to launch Chrome");
    page.load_url(&start_test_server()).expect("Failed to load URL");
    page
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_full_page_capture() {
    let mut page = launch();
    let metrics = page.metrics().unwrap();
    let g = metrics.geometry;
    assert!(g.scroll_height >= 2500);

    let capturer = Capturer::new(CaptureConfig::default()).unwrap();
    let out = capturer.capture_full_page(&mut page).unwrap();

    assert_eq!(&out.bytes[0..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!((out.width, out.height), g.surface_size());

    let after = page.metrics().unwrap();
    assert_eq!(after.scroll_y, metrics.scroll_y);

    page.close().unwrap();
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_visible_capture_excludes_overlay() {
    let mut page = launch();
    let capturer = Capturer::new(CaptureConfig::default()).unwrap();
    let out = capturer.capture_visible(&mut page).unwrap();

    let img = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
    let corner = img.get_pixel(img.width() - 5, 45);
    assert_ne!(corner.0, [0, 255, 0, 255], "overlay panel leaked into capture");

    page.close().unwrap();
}
