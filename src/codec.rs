use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("could not decode {}: {}", .path.display(), .source)]
pub struct DecodeError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

/// Decodes one raster and shrinks it to at most `max_width` pixels wide,
/// preserving aspect ratio. Images already narrower are returned as decoded;
/// nothing is ever upscaled. A `max_width` of zero disables downsampling.
pub fn decode_and_resize(path: &Path, max_width: u32) -> Result<RgbaImage, DecodeError> {
    let decoded = image::open(path).map_err(|source| DecodeError {
        path: path.to_path_buf(),
        source,
    })?;

    let raster = if max_width > 0 && decoded.width() > max_width {
        decoded.resize(max_width, u32::MAX, FilterType::Lanczos3)
    } else {
        decoded
    };

    Ok(raster.to_rgba8())
}
