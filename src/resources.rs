//! Static configuration resources: prompt templates and provider metadata.
//!
//! Both resources are TOML documents. The defaults are embedded in the
//! binary; a directory containing `prompts.toml` and `providers.toml` can
//! replace them at startup. Loading happens once and any problem (missing
//! file, bad TOML, missing template, missing provider) is fatal, so a
//! running assistant never discovers a broken resource mid-conversation.
//!
//! The parsed [`Resources`] value is passed by reference to the provider
//! factory and the prompt builder; nothing here is global.

use crate::config::Language;
use crate::error::DocChatError;
use crate::provider::ProviderKind;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_PROMPTS: &str = include_str!("../resources/prompts.toml");
const DEFAULT_PROVIDERS: &str = include_str!("../resources/providers.toml");

/// File name of the prompt resource inside an override directory.
pub const PROMPTS_FILE: &str = "prompts.toml";
/// File name of the provider resource inside an override directory.
pub const PROVIDERS_FILE: &str = "providers.toml";

/// Everything loaded from the two resource files.
#[derive(Debug, Clone)]
pub struct Resources {
    pub prompts: PromptResources,
    pub providers: ProviderCatalog,
}

impl Resources {
    /// Parse the embedded default resources.
    pub fn embedded() -> Result<Self, DocChatError> {
        Self::from_strs(DEFAULT_PROMPTS, DEFAULT_PROVIDERS)
    }

    /// Load resources from `dir`, or the embedded defaults when `None`.
    pub fn load(dir: Option<&Path>) -> Result<Self, DocChatError> {
        let Some(dir) = dir else {
            debug!("Using embedded resources");
            return Self::embedded();
        };

        let prompts = read_resource(&dir.join(PROMPTS_FILE))?;
        let providers = read_resource(&dir.join(PROVIDERS_FILE))?;
        info!("Loaded resources from {}", dir.display());
        Self::from_strs(&prompts, &providers)
    }

    /// Parse resources from in-memory TOML text.
    pub fn from_strs(prompts: &str, providers: &str) -> Result<Self, DocChatError> {
        let prompts: PromptResources =
            toml::from_str(prompts).map_err(|e| DocChatError::ResourceMalformed {
                resource: PROMPTS_FILE.to_string(),
                detail: e.to_string(),
            })?;
        let providers: ProviderCatalog =
            toml::from_str(providers).map_err(|e| DocChatError::ResourceMalformed {
                resource: PROVIDERS_FILE.to_string(),
                detail: e.to_string(),
            })?;
        providers.validate()?;
        Ok(Self { prompts, providers })
    }
}

fn read_resource(path: &Path) -> Result<String, DocChatError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DocChatError::ResourceMissing {
                path: path.to_path_buf(),
            }
        } else {
            DocChatError::ResourceMalformed {
                resource: path.display().to_string(),
                detail: e.to_string(),
            }
        }
    })
}

// ── Prompt resources ─────────────────────────────────────────────────────

/// A text with one variant per supported language.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Localized {
    pub en: String,
    pub zh: String,
}

impl Localized {
    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::English => &self.en,
            Language::Chinese => &self.zh,
        }
    }
}

/// The fixed set of named templates. Unknown or missing names fail parsing.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Templates {
    pub system: Localized,
    pub query: Localized,
    pub followup: Localized,
    pub context: Localized,
    pub validation: Localized,
}

impl Templates {
    /// `(name, template)` pairs in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Localized)> {
        [
            ("system", &self.system),
            ("query", &self.query),
            ("followup", &self.followup),
            ("context", &self.context),
            ("validation", &self.validation),
        ]
        .into_iter()
    }
}

/// Fixed strings substituted into templates.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Placeholders {
    /// Used for `text` when no document content is available.
    pub no_content: Localized,
    pub user_label: Localized,
    pub assistant_label: Localized,
}

/// Contents of `prompts.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptResources {
    pub placeholders: Placeholders,
    pub templates: Templates,
}

// ── Provider resources ───────────────────────────────────────────────────

/// Metadata for one provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMeta {
    pub display_name: String,
    /// Chat-completions URL for hosted providers, server base URL for Ollama.
    pub api_url: String,
    /// Environment variable holding the bearer credential.
    #[serde(default)]
    pub credential_env: Option<String>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub models: Vec<String>,
    /// Reply substituted for the model's answer when a call fails.
    pub error_message: String,
}

/// Shared error texts.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorTexts {
    /// Reply of the unsupported-provider fallback.
    pub base: String,
    pub api_error: String,
    pub file_not_found: String,
    pub list_error: String,
}

impl ErrorTexts {
    /// Notice text for a failed provider call.
    pub fn api_error(&self, model: &str, error: &str) -> String {
        self.api_error
            .replace("{model}", model)
            .replace("{error}", error)
    }

    /// Diagnostic returned when listing local models fails.
    pub fn list_error(&self, error: &str) -> String {
        self.list_error.replace("{error}", error)
    }
}

/// Contents of `providers.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCatalog {
    pub errors: ErrorTexts,
    pub providers: HashMap<String, ProviderMeta>,
}

impl ProviderCatalog {
    /// Metadata for a known provider kind.
    ///
    /// Always present once [`Self::validate`] has passed.
    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderMeta> {
        self.providers.get(kind.key())
    }

    fn validate(&self) -> Result<(), DocChatError> {
        for kind in ProviderKind::all() {
            let meta = self.get(kind).ok_or_else(|| DocChatError::ResourceMalformed {
                resource: PROVIDERS_FILE.to_string(),
                detail: format!("missing [providers.{}] table", kind.key()),
            })?;
            if meta.api_url.trim().is_empty() {
                return Err(DocChatError::ResourceMalformed {
                    resource: PROVIDERS_FILE.to_string(),
                    detail: format!("providers.{}.api_url is empty", kind.key()),
                });
            }
            if kind.is_hosted() && meta.credential_env.is_none() {
                return Err(DocChatError::ResourceMalformed {
                    resource: PROVIDERS_FILE.to_string(),
                    detail: format!("providers.{}.credential_env is required", kind.key()),
                });
            }
        }
        Ok(())
    }
}
