//! Model providers: one interface over a local runner and two hosted APIs.
//!
//! ```text
//! ModelSelection ──▶ ProviderFactory::create ──▶ Provider
//!                                                 ├─ Ollama     (local, no credential)
//!                                                 ├─ OpenAi     (HTTPS, bearer key)
//!                                                 ├─ DeepSeek   (HTTPS, bearer key)
//!                                                 └─ Unsupported (fixed reply)
//! ```
//!
//! [`ChatModel::complete`] reports failures as [`ProviderError`] so the
//! session can tell the user what happened. [`ChatModel::generate_response`]
//! is the never-failing form: any error becomes the provider's configured
//! placeholder text.

pub mod hosted;
pub mod local;
pub mod postprocess;

use crate::config::ChatConfig;
use crate::error::ProviderError;
use crate::resources::ProviderCatalog;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub use hosted::HostedModel;
pub use local::{list_local_models, OllamaModel};

/// The three supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Local model server (Ollama).
    Ollama,
    /// OpenAI chat completions.
    OpenAi,
    /// DeepSeek chat completions.
    DeepSeek,
}

impl ProviderKind {
    pub fn all() -> [ProviderKind; 3] {
        [ProviderKind::Ollama, ProviderKind::OpenAi, ProviderKind::DeepSeek]
    }

    /// Table name in `providers.toml`.
    pub fn key(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    /// Whether the provider needs a bearer credential.
    pub fn is_hosted(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAi),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            _ => Err(ProviderError::Unsupported {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What the user picked for one interaction cycle. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelSelection {
    /// Parsed provider, `None` when the name is unknown.
    pub provider: Option<ProviderKind>,
    /// The name as the user gave it.
    pub provider_name: String,
    pub model_name: String,
    /// Explicit credential; falls back to the provider's env variable.
    pub credential: Option<String>,
}

impl ModelSelection {
    pub fn new(provider_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        let provider_name = provider_name.into();
        Self {
            provider: provider_name.parse().ok(),
            provider_name,
            model_name: model_name.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

impl fmt::Debug for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSelection")
            .field("provider", &self.provider)
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A backend that turns a prompt into a reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Display label for logs and notices, e.g. `OpenAI (gpt-4o)`.
    fn label(&self) -> &str;

    /// Reply used in place of an answer when a call fails.
    fn fallback_message(&self) -> &str;

    /// Send `prompt` and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Send `prompt`; on any failure return [`Self::fallback_message`].
    async fn generate_response(&self, prompt: &str) -> String {
        match self.complete(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{}: {}", self.label(), e);
                self.fallback_message().to_string()
            }
        }
    }
}

/// Null-object provider for unknown names.
#[derive(Debug, Clone)]
pub struct UnsupportedModel {
    name: String,
    label: String,
    message: String,
}

impl UnsupportedModel {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: format!("{name} (unsupported)"),
            name,
            message: message.into(),
        }
    }
}

#[async_trait]
impl ChatModel for UnsupportedModel {
    fn label(&self) -> &str {
        &self.label
    }

    fn fallback_message(&self) -> &str {
        &self.message
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported {
            name: self.name.clone(),
        })
    }
}

/// The concrete provider chosen for a selection.
#[derive(Debug, Clone)]
pub enum Provider {
    Ollama(OllamaModel),
    OpenAi(HostedModel),
    DeepSeek(HostedModel),
    Unsupported(UnsupportedModel),
}

impl Provider {
    fn inner(&self) -> &dyn ChatModel {
        match self {
            Provider::Ollama(m) => m,
            Provider::OpenAi(m) | Provider::DeepSeek(m) => m,
            Provider::Unsupported(m) => m,
        }
    }

    pub fn kind(&self) -> Option<ProviderKind> {
        match self {
            Provider::Ollama(_) => Some(ProviderKind::Ollama),
            Provider::OpenAi(_) => Some(ProviderKind::OpenAi),
            Provider::DeepSeek(_) => Some(ProviderKind::DeepSeek),
            Provider::Unsupported(_) => None,
        }
    }
}

#[async_trait]
impl ChatModel for Provider {
    fn label(&self) -> &str {
        self.inner().label()
    }

    fn fallback_message(&self) -> &str {
        self.inner().fallback_message()
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.inner().complete(prompt).await
    }
}

/// Maps a [`ModelSelection`] to a [`Provider`].
pub struct ProviderFactory<'a> {
    catalog: &'a ProviderCatalog,
    config: &'a ChatConfig,
    client: reqwest::Client,
}

impl<'a> ProviderFactory<'a> {
    pub fn new(catalog: &'a ProviderCatalog, config: &'a ChatConfig, client: reqwest::Client) -> Self {
        Self {
            catalog,
            config,
            client,
        }
    }

    /// Build the provider for `selection`.
    ///
    /// Unknown provider names yield [`Provider::Unsupported`]. Hosted
    /// credentials are resolved here: the explicit credential first, then
    /// the provider's environment variable.
    pub fn create(&self, selection: &ModelSelection) -> Provider {
        let unsupported = || {
            Provider::Unsupported(UnsupportedModel::new(
                selection.provider_name.clone(),
                self.catalog.errors.base.clone(),
            ))
        };
        let Some(kind) = selection.provider else {
            debug!("Unknown provider '{}'", selection.provider_name);
            return unsupported();
        };
        let Some(meta) = self.catalog.get(kind) else {
            return unsupported();
        };

        let model = if selection.model_name.trim().is_empty() {
            meta.models.first().cloned().unwrap_or_default()
        } else {
            selection.model_name.trim().to_string()
        };

        match kind {
            ProviderKind::Ollama => {
                let endpoint = self
                    .config
                    .ollama_endpoint
                    .clone()
                    .unwrap_or_else(|| meta.api_url.clone());
                Provider::Ollama(OllamaModel::new(
                    self.client.clone(),
                    endpoint,
                    model,
                    meta.error_message.clone(),
                ))
            }
            ProviderKind::OpenAi | ProviderKind::DeepSeek => {
                let env = meta.credential_env.clone().unwrap_or_default();
                let credential = selection
                    .credential
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .or_else(|| read_credential(&env));
                let hosted = HostedModel::new(
                    self.client.clone(),
                    meta,
                    model,
                    credential,
                    self.config.temperature,
                );
                if kind == ProviderKind::OpenAi {
                    Provider::OpenAi(hosted)
                } else {
                    Provider::DeepSeek(hosted)
                }
            }
        }
    }
}

/// Read a non-empty credential from the environment.
pub fn read_credential(env: &str) -> Option<String> {
    if env.is_empty() {
        return None;
    }
    std::env::var(env).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Resources;

    fn factory_parts() -> (Resources, ChatConfig) {
        (Resources::embedded().unwrap(), ChatConfig::default())
    }

    #[test]
    fn provider_kind_parsing() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("DeepSeek".parse::<ProviderKind>().unwrap(), ProviderKind::DeepSeek);
        assert!("Claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn selection_with_unknown_provider() {
        let sel = ModelSelection::new("Mistral", "large");
        assert_eq!(sel.provider, None);
        assert_eq!(sel.provider_name, "Mistral");
    }

    #[test]
    fn selection_debug_redacts_credential() {
        let sel = ModelSelection::new("openai", "gpt-4o").with_credential("sk-secret");
        let dbg = format!("{sel:?}");
        assert!(!dbg.contains("sk-secret"));
    }

    #[tokio::test]
    async fn unknown_provider_always_returns_base_message() {
        let (res, config) = factory_parts();
        let factory = ProviderFactory::new(&res.providers, &config, reqwest::Client::new());
        let provider = factory.create(&ModelSelection::new("Mistral", "large"));
        assert!(matches!(provider, Provider::Unsupported(_)));
        for prompt in ["", "hello", "a much longer prompt\nwith lines"] {
            assert_eq!(provider.generate_response(prompt).await, res.providers.errors.base);
        }
    }

    #[test]
    fn factory_maps_known_providers() {
        let (res, config) = factory_parts();
        let factory = ProviderFactory::new(&res.providers, &config, reqwest::Client::new());
        let p = factory.create(&ModelSelection::new("ollama", "llama3"));
        assert_eq!(p.kind(), Some(ProviderKind::Ollama));
        assert_eq!(p.label(), "Ollama (llama3)");
        let p = factory.create(&ModelSelection::new("openai", "gpt-4o").with_credential("k"));
        assert_eq!(p.kind(), Some(ProviderKind::OpenAi));
        let p = factory.create(&ModelSelection::new("deepseek", "").with_credential("k"));
        assert_eq!(p.kind(), Some(ProviderKind::DeepSeek));
        assert_eq!(p.label(), "DeepSeek (deepseek-chat)");
    }

    #[tokio::test]
    async fn hosted_without_credential_returns_error_message() {
        let mut res = Resources::embedded().unwrap();
        // Point at an env slot nobody sets so the test is hermetic.
        res.providers
            .providers
            .get_mut("deepseek")
            .unwrap()
            .credential_env = Some("DOCCHAT_TEST_UNSET_KEY".to_string());
        let config = ChatConfig::default();
        let factory = ProviderFactory::new(&res.providers, &config, reqwest::Client::new());
        let provider = factory.create(&ModelSelection::new("deepseek", "deepseek-chat"));
        let expected = &res.providers.get(ProviderKind::DeepSeek).unwrap().error_message;
        assert_eq!(&provider.generate_response("hi").await, expected);
    }
}
