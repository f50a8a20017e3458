//! # docchat
//!
//! Chat with PDF documents and images through a local or hosted LLM.
//!
//! ## Why this crate?
//!
//! Reading a paper with an LLM means the same chores every time: pull the
//! text out of a PDF or a scanned page, wrap it in a careful prompt, send it
//! to whichever model is at hand, and keep the conversation straight. This
//! crate does those chores behind one provider-agnostic interface, so the
//! same session works against a model on your laptop (Ollama) or a hosted
//! API (OpenAI, DeepSeek).
//!
//! ## Flow Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Extract  pdfium text layer, or tesseract OCR (eng + chi_sim)
//!  ├─ 2. Prompt   system + query template, optional follow-up history
//!  ├─ 3. Model    Ollama | OpenAI | DeepSeek | Unsupported (fixed reply)
//!  ├─ 4. Clean    strip reasoning blocks, trim the ends
//!  └─ 5. Session  user turn + assistant turn appended, notices queued
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docchat::{extract, Assistant, ChatConfig, ModelSelection, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChatConfig::default();
//!     let (text, notice) = extract::document_text("paper.pdf", &config).await;
//!     if let Some(n) = notice {
//!         eprintln!("{}", n.message);
//!     }
//!
//!     let assistant = Assistant::new(config)?;
//!     let mut session = Session::new();
//!     let selection = ModelSelection::new("openai", "gpt-4o");
//!     assistant
//!         .submit(&mut session, "What problem does the paper solve?", &selection, Some(&text))
//!         .await;
//!     for turn in session.transcript() {
//!         println!("{}: {}", turn.role.as_str(), turn.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docchat` binary (clap, rustyline, dialoguer, indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docchat = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Task | Needs |
//! |------|-------|
//! | PDF text | libpdfium (next to the binary, system-wide, or `PDFIUM_LIB_PATH`) |
//! | Image OCR | `tesseract` with `eng` and `chi_sim` packs |
//! | PDF export | `wkhtmltopdf` |
//! | Local models | `ollama` |
//!
//! Each one is optional: a missing tool turns into a notice, never a crash.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod latex;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod resources;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chat::Assistant;
pub use config::{ChatConfig, ChatConfigBuilder, Language};
pub use error::{DocChatError, ExportError, ExtractError, ProviderError};
pub use export::{export_html, export_pdf, write_export, ExportFormat};
pub use progress::{ChatProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::PromptBuilder;
pub use provider::{ChatModel, ModelSelection, Provider, ProviderFactory, ProviderKind};
pub use resources::Resources;
pub use session::{Exchange, Mode, Notice, NoticeLevel, Role, Session, Turn, TurnContext};
