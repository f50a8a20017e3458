//! Image text extraction (OCR).
//!
//! The image is decoded with the `image` crate and re-encoded as a PNG in
//! a scratch directory, which normalises JPEG/PNG variants and rejects
//! corrupt files before the OCR engine sees them. Recognition is done by
//! the `tesseract` CLI with every configured language at once.

use crate::error::ExtractError;
use image::ImageFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Binary invoked for recognition.
const OCR_BINARY: &str = "tesseract";

/// Recognise the text in `path` using `languages` (e.g. `eng+chi_sim`).
pub async fn extract_image_text(path: &Path, languages: &str) -> Result<String, ExtractError> {
    let scratch = TempDir::new().map_err(|e| ExtractError::Internal(e.to_string()))?;
    let png = scratch.path().join("input.png");

    let src = path.to_path_buf();
    let dst = png.clone();
    tokio::task::spawn_blocking(move || normalise_image(&src, &dst))
        .await
        .map_err(|e| ExtractError::Internal(format!("Image task panicked: {}", e)))??;

    info!("Running OCR on {} ({})", path.display(), languages);
    let output = tokio::process::Command::new(OCR_BINARY)
        .arg(&png)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ExtractError::OcrUnavailable
            } else {
                ExtractError::OcrFailed {
                    detail: e.to_string(),
                }
            }
        })?;

    if !output.status.success() {
        return Err(ExtractError::OcrFailed {
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let text = join_lines(&String::from_utf8_lossy(&output.stdout));
    debug!("OCR produced {} chars", text.len());
    Ok(text)
}

/// Decode `src` and write it to `dst` as PNG.
fn normalise_image(src: &Path, dst: &PathBuf) -> Result<(), ExtractError> {
    let img = image::open(src).map_err(|e| match e {
        image::ImageError::IoError(io) if io.kind() == ErrorKind::NotFound => {
            ExtractError::FileNotFound {
                path: src.to_path_buf(),
            }
        }
        other => ExtractError::UnsupportedImage {
            path: src.to_path_buf(),
            detail: other.to_string(),
        },
    })?;
    debug!("Decoded {}x{} image", img.width(), img.height());
    img.save_with_format(dst, ImageFormat::Png)
        .map_err(|e| ExtractError::Io {
            path: dst.clone(),
            source: std::io::Error::other(e.to_string()),
        })
}

/// Trim every recognised line and drop the blank ones.
pub fn join_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
