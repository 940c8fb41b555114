//! Full-page capture of a generated page, no browser required

use rfstitch::synthetic::SyntheticPage;
use rfstitch::{CaptureConfig, Capturer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("RFox Stitch - Synthetic Capture Example\n");

    let config = CaptureConfig {
        settle_delay_ms: 10,
        ..CaptureConfig::instant()
    };
    println!("Settle delay: {}ms", config.settle_delay_ms);
    println!(
        "Surface limits: {}px per side, {} pixels total\n",
        config.limits.max_dimension, config.limits.max_pixels
    );

    let mut capturer = Capturer::new(config)?;
    capturer.on_progress(|p| println!("  {:?} / {} segments", p.state, p.total));

    // A 1280x720 viewport over a 5000px page on a 2x display
    let mut page = SyntheticPage::new(1280, 5000, 720, 2.0)
        .with_fixed_header(64)
        .with_overlay();
    let g = page.geometry();
    println!(
        "Page: {}x{} css px at dpr {} -> {} segments\n",
        g.viewport_width,
        g.scroll_height,
        g.dpr,
        g.segment_count()
    );

    let image = capturer.capture_full_page(&mut page)?;
    println!(
        "\nCaptured {}x{} ({} bytes, sha256 {})",
        image.width,
        image.height,
        image.bytes.len(),
        image.sha256_hex()
    );

    let path = image.save_in(&std::env::temp_dir())?;
    println!("Saved to: {}", path.display());
    Ok(())
}
