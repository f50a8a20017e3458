//! PDF text extraction via pdfium.
//!
//! pdfium is not safe to drive from async worker threads, so the whole
//! load-and-read cycle runs inside `spawn_blocking`.
//!
//! The library is located in this order:
//! 1. `PDFIUM_LIB_PATH` (a file or a directory containing libpdfium)
//! 2. the current directory
//! 3. the system library search path

use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable that points at a pdfium shared library.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Text of one PDF, pages joined with `"\n"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfText {
    pub text: String,
    pub page_count: usize,
}

/// Extract the text layer of every page.
pub async fn extract_pdf_text(path: &Path) -> Result<PdfText, ExtractError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&path))
        .await
        .map_err(|e| ExtractError::Internal(format!("PDF task panicked: {}", e)))?
}

fn extract_blocking(path: &Path) -> Result<PdfText, ExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.contains("Password") || detail.contains("password") {
            ExtractError::PasswordRequired {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::CorruptPdf {
                path: path.to_path_buf(),
                detail,
            }
        }
    })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF loaded: {} pages", page_count);

    let mut texts = Vec::with_capacity(page_count);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| ExtractError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, text.len());
        texts.push(text);
    }

    Ok(PdfText {
        text: join_pages(&texts),
        page_count,
    })
}

/// Join page texts with a newline, dropping pages without a text layer.
pub fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim_end())
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let mut attempts = Vec::new();

    if let Ok(configured) = std::env::var(PDFIUM_LIB_ENV) {
        let candidate = library_path(Path::new(&configured));
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => attempts.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&local) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(e) => attempts.push(format!("{}: {:?}", local.display(), e)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(ExtractError::PdfEngineUnavailable(attempts.join("; ")))
        }
    }
}

/// A directory means "the platform library name inside it".
fn library_path(configured: &Path) -> PathBuf {
    if configured.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(configured)
    } else {
        configured.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_skips_empty_pages() {
        let pages = vec![
            "Page one text  ".to_string(),
            "   ".to_string(),
            "Page three".to_string(),
        ];
        assert_eq!(join_pages(&pages), "Page one text\nPage three");
    }

    #[test]
    fn join_of_nothing_is_empty() {
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn library_path_for_file_is_unchanged() {
        let p = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_path(p), p.to_path_buf());
    }

    #[test]
    fn library_path_for_dir_appends_platform_name() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = library_path(dir.path());
        assert!(resolved.starts_with(dir.path()));
        assert!(resolved.to_string_lossy().contains("pdfium"));
    }
}
