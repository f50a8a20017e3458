//! Document and image text extraction.
//!
//! ```text
//! path / URL ──▶ input::resolve_input ──▶ pdf::extract_pdf_text   (pdfium)
//!                                     └─▶ ocr::extract_image_text   (tesseract)
//! ```
//!
//! [`extract`] reports failures as [`ExtractError`]. The chat front ends use
//! the lenient forms [`document_text`] and [`image_text`], which never fail:
//! a broken input yields empty text plus an error [`Notice`], and the chat
//! carries on with the "no content" placeholder.

pub mod input;
pub mod ocr;
pub mod pdf;
pub mod split;

use crate::config::ChatConfig;
use crate::error::ExtractError;
use crate::session::Notice;
use tracing::{info, warn};

pub use input::InputKind;
pub use split::{split_into_chunks, TextSplitter};

/// Text pulled out of one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub kind: InputKind,
    /// Page count for PDFs.
    pub page_count: Option<usize>,
}

/// Resolve `input` (path or URL) and extract its text.
pub async fn extract(
    input: &str,
    kind: InputKind,
    config: &ChatConfig,
) -> Result<Extracted, ExtractError> {
    let resolved = input::resolve_input(input, kind, config.api_timeout()).await?;
    let extracted = match kind {
        InputKind::Pdf => {
            let pdf = pdf::extract_pdf_text(resolved.path()).await?;
            Extracted {
                text: pdf.text,
                kind,
                page_count: Some(pdf.page_count),
            }
        }
        InputKind::Image => Extracted {
            text: ocr::extract_image_text(resolved.path(), &config.ocr_language_arg()).await?,
            kind,
            page_count: None,
        },
    };
    info!(
        "Extracted {} chars from {}",
        extracted.text.chars().count(),
        input
    );
    Ok(extracted)
}

/// PDF text, or empty text plus a notice.
pub async fn document_text(input: &str, config: &ChatConfig) -> (String, Option<Notice>) {
    lenient(input, InputKind::Pdf, config).await
}

/// OCR text, or empty text plus a notice.
pub async fn image_text(input: &str, config: &ChatConfig) -> (String, Option<Notice>) {
    lenient(input, InputKind::Image, config).await
}

async fn lenient(input: &str, kind: InputKind, config: &ChatConfig) -> (String, Option<Notice>) {
    match extract(input, kind, config).await {
        Ok(extracted) if extracted.text.trim().is_empty() => {
            let what = match kind {
                InputKind::Pdf => "PDF has no text layer",
                InputKind::Image => "No text was recognised in the image",
            };
            (String::new(), Some(Notice::warning(format!("{what}: {input}"))))
        }
        Ok(extracted) => (extracted.text, None),
        Err(e) => {
            warn!("Extraction failed for {}: {}", input, e);
            let prefix = match kind {
                InputKind::Pdf => "Error processing PDF",
                InputKind::Image => "Error processing image",
            };
            (String::new(), Some(Notice::error(format!("{prefix}: {e}"))))
        }
    }
}
