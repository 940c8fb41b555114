use std::fs;
use std::path::PathBuf;

use rfstitch::synthetic::SyntheticPage;
use rfstitch::{CaptureConfig, Capturer};
use sha2::{Digest, Sha256};

fn golden_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("tests/goldens/expected");
    p.push(name);
    p
}

/// Digest of the decoded RGBA pixels, independent of PNG encoder settings.
fn pixel_digest(png: &[u8]) -> String {
    let pixels = image::load_from_memory(png)
        .expect("decode png")
        .to_rgba8();
    hex::encode(Sha256::digest(pixels.as_raw()))
}

#[test]
fn golden_synthetic_capture_matches_digest() {
    let capturer = Capturer::new(CaptureConfig::instant()).expect("config");
    let mut page = SyntheticPage::new(96, 1000, 240, 2.0)
        .with_fixed_header(16)
        .with_overlay();
    let out = capturer.capture_full_page(&mut page).expect("capture");
    assert_eq!((out.width, out.height), (192, 2000));
    let digest = pixel_digest(&out.bytes);

    let expected_path = golden_path("synthetic_fullpage.rgba.sha256");
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all("tests/goldens/expected").ok();
        fs::write(&expected_path, format!("{}\n", digest)).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }

    let exp = fs::read_to_string(&expected_path)
        .unwrap_or_else(|e| panic!("missing golden {:?}: {}", expected_path, e));
    assert_eq!(digest, exp.trim());
}
