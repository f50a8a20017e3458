//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! pdfium and tesseract both need a file-system path. A URL is downloaded
//! into a `TempDir` that lives as long as the [`ResolvedInput`], so the
//! scratch copy disappears once extraction is done. PDF inputs are checked
//! for the `%PDF` magic bytes up front so the user gets a clear error
//! instead of a pdfium failure.

use crate::error::ExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// What kind of document the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
}

impl InputKind {
    /// Guess from a file name's extension; anything unknown is a PDF.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        let ext = lower.rsplit('.').next().unwrap_or_default();
        match ext {
            "png" | "jpg" | "jpeg" => InputKind::Image,
            _ => InputKind::Pdf,
        }
    }

    fn default_file_name(&self) -> &'static str {
        match self {
            InputKind::Pdf => "downloaded.pdf",
            InputKind::Image => "downloaded.png",
        }
    }
}

/// The resolved input, either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    Local(PathBuf),
    /// The `TempDir` is held so the file survives until extraction ends.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a readable local file of the expected kind.
pub async fn resolve_input(
    input: &str,
    kind: InputKind,
    timeout: Duration,
) -> Result<ResolvedInput, ExtractError> {
    if is_url(input) {
        download_url(input, kind, timeout).await
    } else {
        resolve_local(input, kind)
    }
}

fn resolve_local(path_str: &str, kind: InputKind) -> Result<ResolvedInput, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == InputKind::Pdf {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && !is_pdf_magic(&magic) {
                    return Err(ExtractError::NotAPdf { path, magic });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => return Err(ExtractError::FileNotFound { path }),
    }

    debug!("Resolved local input: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(
    url: &str,
    kind: InputKind,
    timeout: Duration,
) -> Result<ResolvedInput, ExtractError> {
    info!("Downloading {:?} from: {}", kind, url);
    let failed = |reason: String| ExtractError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("no response after {}s", timeout.as_secs()))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url).unwrap_or_else(|| kind.default_file_name().to_string());
    let temp_dir = TempDir::new().map_err(|e| ExtractError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    if kind == InputKind::Pdf && bytes.len() >= 4 && !is_pdf_magic(&bytes[..4]) {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(ExtractError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ExtractError::Io {
            path: file_path.clone(),
            source: e,
        })?;

    info!("Downloaded to: {}", file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

fn is_pdf_magic(bytes: &[u8]) -> bool {
    bytes == b"%PDF"
}

/// Last path segment when it looks like a file name.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}
