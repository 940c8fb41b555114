//! PNG output for finished surfaces

use crate::{Error, Result};
use base64::Engine as Base64Engine;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// An encoded capture ready to hand to a consumer.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// PNG bytes
    pub bytes: Vec<u8>,
    /// Suggested download name, e.g. `fullpage-2024-05-01T09-30-12.png`
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }

    /// `data:` URL form of the image.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Hex SHA-256 of the encoded bytes.
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Write the image into `dir` under its suggested filename.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)
            .map_err(|e| Error::Other(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

/// Encode `surface` as PNG. The surface is consumed and its pixel buffer is
/// freed before this returns.
pub fn encode(surface: RgbaImage, prefix: &str) -> Result<EncodedImage> {
    let (width, height) = surface.dimensions();
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| Error::EncodeFailed(format!("PNG encoding failed: {}", e)))?;
    drop(surface);

    Ok(EncodedImage {
        bytes,
        filename: filename(prefix, chrono::Utc::now()),
        width,
        height,
    })
}

/// `<prefix>-YYYY-MM-DDTHH-MM-SS.png`
pub fn filename(prefix: &str, at: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}-{}.png", prefix, at.format("%Y-%m-%dT%H-%M-%S"))
}
