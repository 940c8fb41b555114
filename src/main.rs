use anyhow::{bail, Context};
use clap::Parser;
use rfstitch::synthetic::SyntheticPage;
use rfstitch::{CaptureConfig, CaptureTarget, Capturer, EncodedImage};
use std::path::PathBuf;

/// Capture a whole scrollable page as a single PNG.
#[derive(Parser, Debug)]
#[command(name = "rfstitch", version, about)]
struct Args {
    /// Page to capture in headless Chrome (requires the `cdp` feature)
    #[arg(long, conflicts_with = "synthetic")]
    url: Option<String>,

    /// Capture a generated test page this many CSS pixels tall instead
    #[arg(long, value_name = "HEIGHT")]
    synthetic: Option<u32>,

    /// Only capture the visible viewport
    #[arg(long)]
    visible: bool,

    /// Directory the PNG is written to
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// JSON capture configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the settle delay after each scroll
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Viewport width in CSS pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height in CSS pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Device pixel ratio of the synthetic page
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,

    /// CSS selector of overlay UI to hide while capturing (repeatable)
    #[arg(long = "overlay")]
    overlay_selectors: Vec<String>,

    /// Print the image as a data: URL instead of writing a file
    #[arg(long)]
    data_url: bool,
}

fn run_capture<T: CaptureTarget + ?Sized>(
    capturer: &Capturer,
    target: &mut T,
    visible: bool,
) -> rfstitch::Result<EncodedImage> {
    if visible {
        capturer.capture_visible(target)
    } else {
        capturer.capture_full_page(target)
    }
}

#[cfg(feature = "cdp")]
fn capture_url(args: &Args, capturer: &Capturer, url: &str) -> anyhow::Result<EncodedImage> {
    use rfstitch::cdp::{BrowserConfig, CdpPage};

    let mut page = CdpPage::launch(BrowserConfig {
        viewport: (args.width, args.height),
        overlay_selectors: args.overlay_selectors.clone(),
        ..Default::default()
    })?;
    page.load_url(url)
        .with_context(|| format!("loading {}", url))?;
    let image = run_capture(capturer, &mut page, args.visible)?;
    page.close()?;
    Ok(image)
}

#[cfg(not(feature = "cdp"))]
fn capture_url(_args: &Args, _capturer: &Capturer, _url: &str) -> anyhow::Result<EncodedImage> {
    bail!("rfstitch was built without the `cdp` feature; use --synthetic or rebuild with --features cdp")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_json_file(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(ms) = args.settle_ms {
        config.settle_delay_ms = ms;
    }

    let mut capturer = Capturer::new(config)?;
    capturer.on_progress(|p| log::info!("{:?} ({} segments)", p.state, p.total));

    let image = match (&args.url, args.synthetic) {
        (Some(url), _) => capture_url(&args, &capturer, url)?,
        (None, Some(page_height)) => {
            let mut page = SyntheticPage::new(args.width, page_height, args.height, args.dpr)
                .with_fixed_header(40)
                .with_overlay();
            run_capture(&capturer, &mut page, args.visible)?
        }
        (None, None) => bail!("nothing to capture: pass --url or --synthetic"),
    };

    if args.data_url {
        println!("{}", image.to_data_url());
        return Ok(());
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let path = image.save_in(&args.out)?;
    println!(
        "{} {}x{} sha256:{}",
        path.display(),
        image.width,
        image.height,
        image.sha256_hex()
    );
    Ok(())
}
