//! Runtime configuration for the assistant.
//!
//! All knobs that are not part of the static resources live in
//! [`ChatConfig`], built via its [`ChatConfigBuilder`]. The resources
//! (templates, provider metadata) are loaded separately by
//! [`crate::resources::Resources`] because they are data, not settings.

use crate::error::DocChatError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for an [`crate::chat::Assistant`].
///
/// # Example
/// ```rust
/// use docchat::{ChatConfig, Language};
///
/// let config = ChatConfig::builder()
///     .api_timeout_secs(60)
///     .language(Language::Chinese)
///     .use_history(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_timeout_secs, 60);
/// ```
#[derive(Clone)]
pub struct ChatConfig {
    /// Upper bound on one provider call in seconds. Default: 120.
    ///
    /// Enforced by the HTTP client and by a timeout around the whole call,
    /// so a stalled local model cannot block the session forever.
    pub api_timeout_secs: u64,

    /// Sampling temperature sent to hosted providers. Default: None
    /// (provider default).
    pub temperature: Option<f32>,

    /// Language variant of every prompt template. Default: English.
    pub language: Language,

    /// Send the prior transcript with each question. Default: false.
    ///
    /// When off, each question is answered from the document alone with
    /// the `query` template. When on, the `followup` template carries the
    /// conversation so far.
    pub use_history: bool,

    /// Tesseract language packs used for image OCR. Default: eng, chi_sim.
    pub ocr_languages: Vec<String>,

    /// Override for the Ollama server URL from the provider resource.
    pub ollama_endpoint: Option<String>,

    /// Height in pixels of the chat view container. Default: 1024.
    pub chat_height: u32,

    /// Directory with `prompts.toml` / `providers.toml` overrides.
    pub resource_dir: Option<PathBuf>,

    /// Optional observer for request lifecycle events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: 120,
            temperature: None,
            language: Language::default(),
            use_history: false,
            ocr_languages: vec!["eng".to_string(), "chi_sim".to_string()],
            ollama_endpoint: None,
            chat_height: 1024,
            resource_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("temperature", &self.temperature)
            .field("language", &self.language)
            .field("use_history", &self.use_history)
            .field("ocr_languages", &self.ocr_languages)
            .field("ollama_endpoint", &self.ollama_endpoint)
            .field("chat_height", &self.chat_height)
            .field("resource_dir", &self.resource_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ChatProgressCallback>"),
            )
            .finish()
    }
}

impl ChatConfig {
    /// Create a new builder for `ChatConfig`.
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder {
            config: Self::default(),
        }
    }

    /// The provider call timeout as a `Duration`.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// OCR languages in tesseract's `-l` syntax (`eng+chi_sim`).
    pub fn ocr_language_arg(&self) -> String {
        self.ocr_languages.join("+")
    }
}

/// Builder for [`ChatConfig`].
#[derive(Debug)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn use_history(mut self, v: bool) -> Self {
        self.config.use_history = v;
        self
    }

    pub fn ocr_languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ocr_languages = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn ollama_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ollama_endpoint = Some(url.into());
        self
    }

    pub fn chat_height(mut self, px: u32) -> Self {
        self.config.chat_height = px;
        self
    }

    pub fn resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.resource_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ChatConfig, DocChatError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(DocChatError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.ocr_languages.is_empty() || c.ocr_languages.iter().any(|l| l.trim().is_empty()) {
            return Err(DocChatError::InvalidConfig(
                "At least one non-empty OCR language is required".into(),
            ));
        }
        if c.chat_height < 100 {
            return Err(DocChatError::InvalidConfig(format!(
                "Chat height must be ≥ 100 px, got {}",
                c.chat_height
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Language variant used to pick prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Chinese,
}

impl Language {
    /// Short tag used as the template key.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
        }
    }
}

impl FromStr for Language {
    type Err = DocChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "zh" | "chinese" | "中文" => Ok(Language::Chinese),
            other => Err(DocChatError::InvalidConfig(format!(
                "Unknown language '{other}'; use en or zh"
            ))),
        }
    }
}
