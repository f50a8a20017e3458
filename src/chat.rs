//! The assistant: resources, prompts, and providers wired together.
//!
//! An [`Assistant`] is built once at startup and shared by reference. It
//! holds nothing per conversation; that lives in a [`Session`] the caller
//! owns and passes in, so one assistant can serve many sessions.
//!
//! ```text
//! Assistant::new(config)
//!  ├─ Resources::load      prompts.toml + providers.toml (fatal on error)
//!  ├─ PromptBuilder::new   compile every template (fatal on error)
//!  └─ reqwest::Client      shared, with the call timeout
//!
//! Assistant::submit(&mut session, text, &selection, document_text)
//!  └─ ProviderFactory::create ─▶ Session::handle_input ─▶ Exchange
//! ```

use crate::config::{ChatConfig, Language};
use crate::error::DocChatError;
use crate::prompts::PromptBuilder;
use crate::provider::postprocess::clean_reply;
use crate::provider::{self, ChatModel, ModelSelection, Provider, ProviderFactory, ProviderKind};
use crate::resources::Resources;
use crate::session::{Exchange, Session, TurnContext};
use tracing::{debug, info};

/// Entry point of the library.
///
/// # Example
/// ```rust,no_run
/// use docchat::{Assistant, ChatConfig, ModelSelection, Session};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let assistant = Assistant::new(ChatConfig::default())?;
///     let mut session = Session::new();
///     let selection = ModelSelection::new("ollama", "llama3");
///     let text = "Attention Is All You Need. Abstract: ...";
///     if let Some(exchange) = assistant
///         .submit(&mut session, "Summarize the abstract", &selection, Some(text))
///         .await
///     {
///         println!("{}", exchange.assistant.content);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Assistant {
    config: ChatConfig,
    resources: Resources,
    prompts: PromptBuilder,
    client: reqwest::Client,
}

impl Assistant {
    /// Load resources (embedded, or from `config.resource_dir`) and
    /// compile the templates.
    ///
    /// # Errors
    /// Any [`DocChatError`]: a missing or malformed resource file, an
    /// invalid template, or an HTTP client that cannot be built.
    pub fn new(config: ChatConfig) -> Result<Self, DocChatError> {
        let resources = Resources::load(config.resource_dir.as_deref())?;
        Self::with_resources(config, resources)
    }

    /// Build from already-loaded resources.
    pub fn with_resources(config: ChatConfig, resources: Resources) -> Result<Self, DocChatError> {
        let prompts = PromptBuilder::new(&resources.prompts, config.language)?;
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout())
            .build()
            .map_err(|e| DocChatError::Internal(format!("HTTP client: {e}")))?;
        debug!("Assistant ready: {:?}", config);
        Ok(Self {
            config,
            resources,
            prompts,
            client,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn language(&self) -> Language {
        self.prompts.language()
    }

    /// Switch the template language for subsequent prompts.
    pub fn set_language(&mut self, language: Language) {
        self.config.language = language;
        self.prompts.set_language(language);
    }

    /// Resolve a selection to a concrete provider.
    pub fn provider(&self, selection: &ModelSelection) -> Provider {
        ProviderFactory::new(&self.resources.providers, &self.config, self.client.clone())
            .create(selection)
    }

    /// Environment variable holding the credential of a hosted provider.
    pub fn credential_env(&self, kind: ProviderKind) -> Option<&str> {
        self.resources
            .providers
            .get(kind)
            .and_then(|m| m.credential_env.as_deref())
    }

    /// True when `selection` is hosted and no credential is available from
    /// the selection or the environment.
    pub fn needs_credential(&self, selection: &ModelSelection) -> bool {
        let Some(kind) = selection.provider.filter(ProviderKind::is_hosted) else {
            return false;
        };
        let explicit = selection
            .credential
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        !explicit
            && self
                .credential_env(kind)
                .and_then(provider::read_credential)
                .is_none()
    }

    /// Default model name for a provider (first listed).
    pub fn default_model(&self, kind: ProviderKind) -> Option<&str> {
        self.resources
            .providers
            .get(kind)
            .and_then(|m| m.models.first())
            .map(String::as_str)
    }

    /// Handle one chat message with the provider chosen by `selection`.
    ///
    /// Returns `None` for blank input. Never fails: provider and prompt
    /// errors become a placeholder reply plus a notice on `session`.
    pub async fn submit(
        &self,
        session: &mut Session,
        text: &str,
        selection: &ModelSelection,
        document_text: Option<&str>,
    ) -> Option<Exchange> {
        let provider = self.provider(selection);
        self.submit_with(session, text, &provider, document_text).await
    }

    /// Like [`Self::submit`] with an explicit model.
    pub async fn submit_with(
        &self,
        session: &mut Session,
        text: &str,
        model: &dyn ChatModel,
        document_text: Option<&str>,
    ) -> Option<Exchange> {
        session.initialize();
        let ctx = TurnContext {
            prompts: &self.prompts,
            model,
            errors: &self.resources.providers.errors,
            timeout: self.config.api_timeout(),
            use_history: self.config.use_history,
            progress: self.config.progress_callback.as_ref(),
        };
        session.handle_input(text, document_text, &ctx).await
    }

    /// Send a raw prompt; failures yield the provider's placeholder.
    pub async fn generate(&self, selection: &ModelSelection, prompt: &str) -> String {
        let provider = self.provider(selection);
        let reply = provider.generate_response(prompt).await;
        let cleaned = clean_reply(&reply);
        if cleaned.is_empty() {
            provider.fallback_message().to_string()
        } else {
            cleaned
        }
    }

    /// Structured analysis of a whole document.
    pub async fn analyze(
        &self,
        selection: &ModelSelection,
        content: &str,
    ) -> Result<String, DocChatError> {
        let prompt = self.prompts.build_context_prompt(content, self.language())?;
        info!("Analyzing {} chars of document text", content.chars().count());
        Ok(self.generate(selection, &prompt).await)
    }

    /// Ask the model to check `response` against `source`.
    pub async fn verify(
        &self,
        selection: &ModelSelection,
        response: &str,
        source: &str,
    ) -> Result<String, DocChatError> {
        let prompt = self
            .prompts
            .build_validation_prompt(response, source, self.language())?;
        info!("Verifying a {}-char answer", response.chars().count());
        Ok(self.generate(selection, &prompt).await)
    }

    /// Locally installed model names (never fails).
    pub async fn list_local_models(&self) -> Vec<String> {
        provider::list_local_models(&self.resources.providers.errors).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant() -> Assistant {
        Assistant::new(ChatConfig::default()).unwrap()
    }

    #[test]
    fn needs_credential_only_for_hosted() {
        let a = assistant();
        assert!(!a.needs_credential(&ModelSelection::new("ollama", "llama3")));
        assert!(!a.needs_credential(&ModelSelection::new("Mistral", "x")));
        assert!(!a.needs_credential(
            &ModelSelection::new("openai", "gpt-4o").with_credential("sk-test")
        ));
    }

    #[test]
    fn default_models_come_from_resources() {
        let a = assistant();
        assert_eq!(a.default_model(ProviderKind::OpenAi), Some("gpt-4"));
        assert_eq!(a.default_model(ProviderKind::DeepSeek), Some("deepseek-chat"));
        assert_eq!(a.default_model(ProviderKind::Ollama), None);
        assert_eq!(a.credential_env(ProviderKind::DeepSeek), Some("DEEPSEEK_API_KEY"));
    }

    #[test]
    fn set_language_updates_prompts() {
        let mut a = assistant();
        a.set_language(Language::Chinese);
        assert_eq!(a.language(), Language::Chinese);
        assert_eq!(a.config().language, Language::Chinese);
    }

    #[tokio::test]
    async fn generate_with_unsupported_provider() {
        let a = assistant();
        let reply = a.generate(&ModelSelection::new("nope", ""), "hi").await;
        assert_eq!(reply, a.resources().providers.errors.base);
    }

    #[test]
    fn missing_resource_dir_is_fatal() {
        let config = ChatConfig::builder()
            .resource_dir("/definitely/not/a/dir")
            .build()
            .unwrap();
        let err = Assistant::new(config).unwrap_err();
        assert!(matches!(err, DocChatError::ResourceMissing { .. }), "got: {err}");
    }
}
