//! Error types for the docchat library.
//!
//! The error taxonomy follows how far a failure is allowed to travel:
//!
//! * [`DocChatError`]: **Fatal.** The assistant cannot start at all
//!   (missing or malformed resource file, invalid template, bad config).
//!   Returned from constructors so startup aborts with a clear message.
//!
//! * [`ProviderError`]: **Per call.** One model request failed (no
//!   credential, network down, non-2xx, garbage payload, timeout). Never
//!   escapes the session: it becomes the provider's placeholder reply plus
//!   a [`crate::session::Notice`].
//!
//! * [`ExtractError`]: **Per document.** PDF or image text extraction
//!   failed. The lenient wrappers in [`crate::extract`] turn it into empty
//!   text plus a notice so the chat continues with degraded input.
//!
//! * [`ExportError`]: writing a transcript to HTML or PDF failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docchat library.
#[derive(Debug, Error)]
pub enum DocChatError {
    // ── Resource errors ───────────────────────────────────────────────────
    /// A resource file was not found in the override directory.
    #[error("Resource file not found: '{path}'\nThe resource directory must contain prompts.toml and providers.toml.")]
    ResourceMissing { path: PathBuf },

    /// A resource file exists but could not be parsed.
    #[error("Resource '{resource}' is malformed: {detail}")]
    ResourceMalformed { resource: String, detail: String },

    /// A prompt template failed to compile.
    #[error("Prompt template '{name}' is invalid: {detail}")]
    TemplateInvalid { name: String, detail: String },

    // ── Request errors ────────────────────────────────────────────────────
    /// A prompt template failed to render for one request.
    #[error("Failed to render prompt '{name}': {detail}")]
    PromptRender { name: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of a single model request.
///
/// Callers never see this through [`crate::provider::ChatModel::generate_response`];
/// it is only exposed by `complete` so the session can report what went wrong.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// A hosted provider was selected but no credential was supplied.
    #[error("{provider}: no API key configured.\nSet {env} or enter a key when prompted.")]
    MissingCredential { provider: String, env: String },

    /// The selected provider name is not one the factory knows.
    #[error("Provider '{name}' is not supported")]
    Unsupported { name: String },

    /// The request never produced an HTTP response.
    #[error("{provider}: request failed: {detail}")]
    Transport { provider: String, detail: String },

    /// The provider answered with a non-2xx status.
    #[error("{provider}: HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The response body did not match the expected JSON shape.
    #[error("{provider}: malformed response: {detail}")]
    MalformedPayload { provider: String, detail: String },

    /// The response parsed but carried no choices.
    #[error("{provider}: response contained no choices")]
    EmptyChoices { provider: String },

    /// The call did not finish within the configured timeout.
    #[error("{provider}: no response after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The local model server could not be reached.
    #[error("Local model server at {endpoint} is unavailable: {detail}\nIs `ollama serve` running?")]
    LocalRunnerUnavailable { endpoint: String, detail: String },
}

/// Failures of the document and image text collaborators.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP download of a remote document failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF requires a password.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Place libpdfium next to the binary, install it system-wide,\n\
or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfEngineUnavailable(String),

    /// The image could not be decoded.
    #[error("Unsupported or corrupt image '{path}': {detail}")]
    UnsupportedImage { path: PathBuf, detail: String },

    /// The OCR engine binary is not installed.
    #[error("OCR engine not found.\nInstall tesseract with the eng and chi_sim language packs.")]
    OcrUnavailable,

    /// The OCR engine ran but reported a failure.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },

    /// Scratch-file I/O failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blocking extraction task panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures while exporting a transcript.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The HTML-to-PDF renderer binary is not installed.
    #[error("PDF renderer not found.\nInstall wkhtmltopdf or export as .html instead.")]
    RendererUnavailable,

    /// The renderer ran but did not produce a PDF.
    #[error("PDF rendering failed: {detail}")]
    RenderFailed { detail: String },

    /// Export format could not be inferred from the file extension.
    #[error("Unsupported export format for '{path}'; use .html or .pdf")]
    UnsupportedFormat { path: PathBuf },

    /// Could not create or write the output file.
    #[error("Failed to write export file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_names_env_var() {
        let e = ProviderError::MissingCredential {
            provider: "OpenAI".into(),
            env: "OPENAI_API_KEY".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("OpenAI"), "got: {msg}");
        assert!(msg.contains("OPENAI_API_KEY"), "got: {msg}");
    }

    #[test]
    fn status_display() {
        let e = ProviderError::Status {
            provider: "DeepSeek".into(),
            status: 401,
            body: "invalid key".into(),
        };
        assert!(e.to_string().contains("HTTP 401"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn timeout_display() {
        let e = ProviderError::Timeout {
            provider: "Ollama".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn resource_missing_display() {
        let e = DocChatError::ResourceMissing {
            path: PathBuf::from("/etc/docchat/prompts.toml"),
        };
        assert!(e.to_string().contains("prompts.toml"));
    }
}
