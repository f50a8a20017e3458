//! Session lifecycle tests against in-process models.
//!
//! No network, no external tools: the models here echo, fail, or stall on
//! purpose so every path through `handle_input` can be checked.

use async_trait::async_trait;
use docchat::{
    Assistant, ChatConfig, ChatModel, ChatProgressCallback, Language, ModelSelection, Notice,
    NoticeLevel, ProgressCallback, ProviderError, Resources, Role, Session, Turn,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test models ──────────────────────────────────────────────────────────────

/// Replies with the prompt it was given.
struct EchoModel {
    prompts: Mutex<Vec<String>>,
}

impl EchoModel {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for EchoModel {
    fn label(&self) -> &str {
        "Echo (test)"
    }

    fn fallback_message(&self) -> &str {
        "echo failed"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("ECHO: {prompt}"))
    }
}

/// Always fails like an unreachable server.
struct DownModel;

#[async_trait]
impl ChatModel for DownModel {
    fn label(&self) -> &str {
        "Down (test)"
    }

    fn fallback_message(&self) -> &str {
        "The model is unavailable."
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Transport {
            provider: "Down".into(),
            detail: "connection refused".into(),
        })
    }
}

/// Never answers in time.
struct StalledModel;

#[async_trait]
impl ChatModel for StalledModel {
    fn label(&self) -> &str {
        "Stalled (test)"
    }

    fn fallback_message(&self) -> &str {
        "Timed out."
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".into())
    }
}

/// Answers with nothing but a reasoning block.
struct SilentModel;

#[async_trait]
impl ChatModel for SilentModel {
    fn label(&self) -> &str {
        "Silent (test)"
    }

    fn fallback_message(&self) -> &str {
        "No answer."
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        Ok("<think>hmm</think>\n\n".into())
    }
}

/// Replies with a fixed text.
struct FixedModel(&'static str);

#[async_trait]
impl ChatModel for FixedModel {
    fn label(&self) -> &str {
        "Fixed (test)"
    }

    fn fallback_message(&self) -> &str {
        "fixed failed"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

#[derive(Default)]
struct CountingCallback {
    starts: AtomicUsize,
    replies: AtomicUsize,
    fallbacks: AtomicUsize,
}

impl ChatProgressCallback for CountingCallback {
    fn on_request_start(&self, _provider: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_reply(&self, _provider: &str, _chars: usize, _elapsed_ms: u64) {
        self.replies.fetch_add(1, Ordering::SeqCst);
    }

    fn on_fallback(&self, _provider: &str, _notice: &Notice) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn assistant() -> Assistant {
    Assistant::new(ChatConfig::default()).expect("embedded resources must load")
}

fn assert_paired(transcript: &[Turn]) {
    assert_eq!(transcript.len() % 2, 0, "transcript must hold whole exchanges");
    for pair in transcript.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
    }
}

// ── Transcript growth ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_successful_input_adds_two_turns() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();

    let exchange = a
        .submit_with(&mut session, "What is attention?", &model, Some("Paper text"))
        .await
        .expect("non-blank input yields an exchange");

    assert!(!exchange.fallback);
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.transcript()[0], Turn::user("What is attention?"));
    assert!(session.transcript()[1].content.starts_with("ECHO: "));
    assert!(session.notices().is_empty());
    assert_eq!(session.current_input(), "");
}

#[tokio::test]
async fn test_failed_input_still_adds_two_turns() {
    let a = assistant();
    let mut session = Session::new();

    let exchange = a
        .submit_with(&mut session, "Hello?", &DownModel, None)
        .await
        .unwrap();

    assert!(exchange.fallback);
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.transcript()[1].content, "The model is unavailable.");

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.contains("connection refused"), "got: {}", notices[0].message);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();

    for blank in ["", "   ", "\n\t  \n"] {
        assert!(a.submit_with(&mut session, blank, &model, None).await.is_none());
    }
    assert!(session.transcript().is_empty());
    assert!(model.prompts.lock().unwrap().is_empty(), "model must not be called");
}

#[tokio::test]
async fn test_many_submissions_stay_paired_and_ordered() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();

    let questions = ["first", "second", "", "third"];
    for q in questions {
        a.submit_with(&mut session, q, &model, None).await;
    }

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 6);
    assert_paired(transcript);
    let asked: Vec<&str> = transcript
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
        .collect();
    assert_eq!(asked, vec!["first", "second", "third"]);
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_summarize_the_abstract_scenario() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();
    let document = "Attention Is All You Need. Abstract: The dominant sequence transduction models...";

    a.submit_with(&mut session, "Summarize the abstract", &model, Some(document))
        .await
        .unwrap();

    let prompt = model.last_prompt();
    assert!(prompt.contains(document), "document text must reach the model");
    assert!(prompt.contains("Summarize the abstract"));

    let transcript = session.transcript();
    assert_eq!(transcript[0], Turn::user("Summarize the abstract"));
    assert_eq!(transcript[1].role, Role::Assistant);
    assert_eq!(transcript[1].content, format!("ECHO: {prompt}"));
}

#[tokio::test]
async fn test_fenced_reply_is_stored_verbatim() {
    let a = assistant();
    let mut session = Session::new();
    let reply = "```\nfn main() {}\n```";

    a.submit_with(&mut session, "Show me main", &FixedModel(reply), None)
        .await
        .unwrap();
    assert_eq!(session.transcript()[1].content, reply);

    let spaced = "Line one  \n\n\n\nLine two";
    a.submit_with(&mut session, "Again", &FixedModel(spaced), None)
        .await
        .unwrap();
    assert_eq!(session.transcript()[3].content, spaced);
}

#[tokio::test]
async fn test_user_turn_keeps_submitted_text() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();

    a.submit_with(&mut session, "  What is X?\n", &model, None)
        .await
        .unwrap();
    assert_eq!(session.transcript()[0].content, "  What is X?\n");
    assert!(model.last_prompt().contains("Question: What is X?\n"));
}

#[tokio::test]
async fn test_missing_document_uses_placeholder() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();

    a.submit_with(&mut session, "Q", &model, Some("   ")).await;
    assert!(model.last_prompt().contains("No text content was provided."));
}

#[tokio::test]
async fn test_chinese_prompts() {
    let config = ChatConfig::builder().language(Language::Chinese).build().unwrap();
    let a = Assistant::new(config).unwrap();
    let model = EchoModel::new();
    let mut session = Session::new();

    a.submit_with(&mut session, "总结摘要", &model, None).await;
    assert!(model.last_prompt().contains("没有提供文本内容。"));
}

#[tokio::test]
async fn test_hosted_provider_without_credential() {
    let mut resources = Resources::embedded().unwrap();
    let meta = resources.providers.providers.get_mut("openai").unwrap();
    meta.credential_env = Some("DOCCHAT_TEST_NO_SUCH_KEY".into());
    let expected = meta.error_message.clone();

    let a = Assistant::with_resources(ChatConfig::default(), resources).unwrap();
    let selection = ModelSelection::new("OpenAI", "gpt-4o");
    assert!(a.needs_credential(&selection));

    let mut session = Session::new();
    let exchange = a
        .submit(&mut session, "Summarize", &selection, Some("text"))
        .await
        .unwrap();

    assert!(exchange.fallback);
    assert_eq!(session.transcript()[1].content, expected);
    let notice = &session.notices()[0];
    assert!(notice.message.contains("DOCCHAT_TEST_NO_SUCH_KEY"), "got: {}", notice.message);
}

#[tokio::test]
async fn test_unknown_provider_replies_with_base_message() {
    let a = assistant();
    let base = a.resources().providers.errors.base.clone();
    let selection = ModelSelection::new("Gemini", "pro");
    let mut session = Session::new();

    for q in ["one", "two"] {
        let exchange = a.submit(&mut session, q, &selection, None).await.unwrap();
        assert_eq!(exchange.assistant.content, base);
    }
    assert_eq!(session.transcript().len(), 4);
}

#[tokio::test]
async fn test_timeout_becomes_fallback() {
    let config = ChatConfig::builder().api_timeout_secs(1).build().unwrap();
    let a = Assistant::new(config).unwrap();
    let mut session = Session::new();

    let exchange = a
        .submit_with(&mut session, "Are you there?", &StalledModel, None)
        .await
        .unwrap();

    assert!(exchange.fallback);
    assert_eq!(exchange.assistant.content, "Timed out.");
    assert!(session.notices()[0].message.contains("1s"));
}

#[tokio::test]
async fn test_empty_reply_becomes_fallback() {
    let a = assistant();
    let mut session = Session::new();

    let exchange = a
        .submit_with(&mut session, "Anything?", &SilentModel, None)
        .await
        .unwrap();

    assert!(exchange.fallback);
    assert_eq!(exchange.assistant.content, "No answer.");
    assert_eq!(session.notices()[0].level, NoticeLevel::Warning);
}

#[tokio::test]
async fn test_prompt_failure_keeps_pairing() {
    let mut resources = Resources::embedded().unwrap();
    resources.prompts.templates.query.en = "{{ missing_variable }}".into();
    let a = Assistant::with_resources(ChatConfig::default(), resources).unwrap();
    let model = EchoModel::new();
    let mut session = Session::new();

    let exchange = a.submit_with(&mut session, "Q", &model, None).await.unwrap();

    assert!(exchange.fallback);
    assert_eq!(exchange.assistant.content, "echo failed");
    assert_paired(session.transcript());
    assert!(model.prompts.lock().unwrap().is_empty());
    assert!(session.notices()[0].message.contains("Error processing request"));
}

// ── History ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_is_sent_when_enabled() {
    let config = ChatConfig::builder().use_history(true).build().unwrap();
    let a = Assistant::new(config).unwrap();
    let model = EchoModel::new();
    let mut session = Session::new();

    a.submit_with(&mut session, "What is X?", &model, None).await;
    assert!(!model.last_prompt().contains("User: What is X?"));

    a.submit_with(&mut session, "And Y?", &model, None).await;
    let prompt = model.last_prompt();
    assert!(prompt.contains("User: What is X?"), "got: {prompt}");
    assert!(prompt.contains("Assistant: ECHO:"));
}

#[tokio::test]
async fn test_history_is_not_sent_by_default() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();

    a.submit_with(&mut session, "What is X?", &model, None).await;
    a.submit_with(&mut session, "And Y?", &model, None).await;
    assert!(!model.last_prompt().contains("What is X?"));
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reset_after_conversation() {
    let a = assistant();
    let model = EchoModel::new();
    let mut session = Session::new();

    a.submit_with(&mut session, "one", &model, None).await;
    session.set_current_input("draft");
    session.set_latex_text("x^2");
    session.reset();

    assert!(session.is_initialized());
    assert!(session.transcript().is_empty());
    assert_eq!(session.current_input(), "");
    assert_eq!(session.latex_text(), "");

    a.submit_with(&mut session, "two", &model, None).await;
    assert_eq!(session.transcript().len(), 2);
    session.destroy();
}

#[tokio::test]
async fn test_progress_callback_events() {
    let counter = Arc::new(CountingCallback::default());
    let cb: ProgressCallback = counter.clone();
    let config = ChatConfig::builder().progress_callback(cb).build().unwrap();
    let a = Assistant::new(config).unwrap();
    let mut session = Session::new();

    a.submit_with(&mut session, "ok", &EchoModel::new(), None).await;
    a.submit_with(&mut session, "fail", &DownModel, None).await;

    assert_eq!(counter.starts.load(Ordering::SeqCst), 2);
    assert_eq!(counter.replies.load(Ordering::SeqCst), 1);
    assert_eq!(counter.fallbacks.load(Ordering::SeqCst), 1);
}
