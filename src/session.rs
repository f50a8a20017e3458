//! Conversation state: transcript, ephemeral input slots, notices.
//!
//! A [`Session`] starts uninitialized, becomes active on first use, and
//! returns to an empty active state on [`Session::reset`]. It is owned by
//! exactly one front end and mutated only through `&mut self`, so two
//! submissions can never interleave.
//!
//! [`Session::handle_input`] is the single entry point for a chat
//! message. Every non-blank submission appends exactly one user turn and
//! exactly one assistant turn, whatever goes wrong in between: a failed
//! prompt render or provider call appends the provider's placeholder and
//! queues a [`Notice`] for the user.

use crate::error::ProviderError;
use crate::prompts::PromptBuilder;
use crate::provider::postprocess::clean_reply;
use crate::provider::ChatModel;
use crate::progress::ProgressCallback;
use crate::resources::ErrorTexts;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ── Turns ────────────────────────────────────────────────────────────────

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ── Notices ──────────────────────────────────────────────────────────────

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Error,
    Warning,
    Info,
}

/// A message for the user that is not part of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// Which surface the front end shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Chat,
    Latex,
}

/// Result of one handled submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: Turn,
    pub assistant: Turn,
    /// True when the assistant turn is a placeholder, not a model answer.
    pub fallback: bool,
}

/// Everything a submission needs besides the session itself.
pub struct TurnContext<'a> {
    pub prompts: &'a PromptBuilder,
    pub model: &'a dyn ChatModel,
    pub errors: &'a ErrorTexts,
    pub timeout: Duration,
    /// Use the follow-up template with the prior transcript.
    pub use_history: bool,
    pub progress: Option<&'a ProgressCallback>,
}

#[derive(Debug, Clone, Default)]
struct State {
    transcript: Vec<Turn>,
    current_input: String,
    mode: Mode,
    latex_text: String,
    notices: Vec<Notice>,
}

/// Per-user conversation state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Option<State>,
}

impl Session {
    /// A new, uninitialized session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish the state slots. Idempotent.
    pub fn initialize(&mut self) {
        if self.state.is_none() {
            debug!("Session initialized");
            self.state = Some(State::default());
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn active(&mut self) -> &mut State {
        self.state.get_or_insert_with(State::default)
    }

    /// Transcript in submission order.
    pub fn transcript(&self) -> &[Turn] {
        self.state.as_ref().map_or(&[], |s| &s.transcript)
    }

    pub fn current_input(&self) -> &str {
        self.state.as_ref().map_or("", |s| &s.current_input)
    }

    pub fn set_current_input(&mut self, text: impl Into<String>) {
        self.active().current_input = text.into();
    }

    pub fn mode(&self) -> Mode {
        self.state.as_ref().map_or(Mode::default(), |s| s.mode)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.active().mode = mode;
    }

    pub fn latex_text(&self) -> &str {
        self.state.as_ref().map_or("", |s| &s.latex_text)
    }

    pub fn set_latex_text(&mut self, text: impl Into<String>) {
        self.active().latex_text = text.into();
    }

    /// Queue a notice for the front end.
    pub fn push_notice(&mut self, notice: Notice) {
        self.active().notices.push(notice);
    }

    /// Pending notices, oldest first.
    pub fn notices(&self) -> &[Notice] {
        self.state.as_ref().map_or(&[], |s| &s.notices)
    }

    /// Remove and return all pending notices.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.active().notices)
    }

    /// The most recent assistant turn, if any.
    pub fn last_answer(&self) -> Option<&Turn> {
        self.transcript()
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
    }

    /// Clear transcript, input, LaTeX draft and notices in one step.
    pub fn reset(&mut self) {
        let mode = self.mode();
        self.state = Some(State {
            mode,
            ..State::default()
        });
        info!("Session reset");
    }

    /// End the session. The value is consumed.
    pub fn destroy(self) {
        debug!("Session destroyed ({} turns)", self.transcript().len());
    }

    /// Handle one chat submission.
    ///
    /// Blank input is ignored and returns `None`. Otherwise the user turn
    /// is appended, the prompt is built from `document_text`, the model is
    /// called within `ctx.timeout`, and an assistant turn is appended with
    /// the cleaned reply or the model's placeholder.
    pub async fn handle_input(
        &mut self,
        text: &str,
        document_text: Option<&str>,
        ctx: &TurnContext<'_>,
    ) -> Option<Exchange> {
        let query = text.trim();
        if query.is_empty() {
            return None;
        }

        // Stored as submitted; only the prompt sees the trimmed query.
        let user = Turn::user(text);
        let history = self.transcript().to_vec();
        self.active().transcript.push(user.clone());

        let documents: Vec<String> = document_text
            .filter(|t| !t.trim().is_empty())
            .map(|t| vec![t.to_string()])
            .unwrap_or_default();

        let label = ctx.model.label();
        let outcome = match build_prompt(ctx, query, &documents, &history) {
            Ok(prompt) => call_model(ctx, &prompt).await,
            Err(e) => Err(Notice::error(format!("Error processing request: {e}"))),
        };

        let (content, fallback) = match outcome {
            Ok(reply) => (reply, false),
            Err(notice) => {
                warn!("{}: falling back to placeholder ({})", label, notice.message);
                if let Some(cb) = ctx.progress {
                    cb.on_fallback(label, &notice);
                }
                self.push_notice(notice);
                (ctx.model.fallback_message().to_string(), true)
            }
        };

        let assistant = Turn::assistant(content);
        let state = self.active();
        state.transcript.push(assistant.clone());
        state.current_input.clear();

        Some(Exchange {
            user,
            assistant,
            fallback,
        })
    }
}

fn build_prompt(
    ctx: &TurnContext<'_>,
    query: &str,
    documents: &[String],
    history: &[Turn],
) -> Result<String, crate::error::DocChatError> {
    if ctx.use_history && !history.is_empty() {
        ctx.prompts.build_followup_prompt(query, documents, history)
    } else {
        ctx.prompts.build_query_prompt(query, documents)
    }
}

/// Call the model and clean its reply. `Err` carries the notice to show.
async fn call_model(ctx: &TurnContext<'_>, prompt: &str) -> Result<String, Notice> {
    let label = ctx.model.label();
    if let Some(cb) = ctx.progress {
        cb.on_request_start(label);
    }
    info!("Sending {} chars to {}", prompt.len(), label);

    let start = Instant::now();
    let result = match tokio::time::timeout(ctx.timeout, ctx.model.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            provider: label.to_string(),
            secs: ctx.timeout.as_secs(),
        }),
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(raw) => {
            let reply = clean_reply(&raw);
            if reply.is_empty() {
                return Err(Notice::warning(
                    ctx.errors.api_error(label, "empty response"),
                ));
            }
            debug!("{}: {} chars in {}ms", label, reply.len(), elapsed_ms);
            if let Some(cb) = ctx.progress {
                cb.on_reply(label, reply.chars().count(), elapsed_ms);
            }
            Ok(reply)
        }
        Err(ProviderError::Unsupported { name }) => Err(Notice::error(format!(
            "Provider '{name}' is not supported"
        ))),
        Err(e) => Err(Notice::error(ctx.errors.api_error(label, &e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_session_reads_as_empty() {
        let session = Session::new();
        assert!(!session.is_initialized());
        assert!(session.transcript().is_empty());
        assert_eq!(session.current_input(), "");
        assert_eq!(session.mode(), Mode::Chat);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut session = Session::new();
        session.initialize();
        session.set_current_input("draft");
        session.initialize();
        assert_eq!(session.current_input(), "draft");
    }

    #[test]
    fn reset_clears_everything_but_mode() {
        let mut session = Session::new();
        session.set_mode(Mode::Latex);
        session.set_current_input("half typed");
        session.set_latex_text("\\frac{a}{b}");
        session.push_notice(Notice::info("hello"));
        session.reset();
        assert!(session.transcript().is_empty());
        assert_eq!(session.current_input(), "");
        assert_eq!(session.latex_text(), "");
        assert!(session.notices().is_empty());
        assert_eq!(session.mode(), Mode::Latex);
    }

    #[test]
    fn drain_notices_empties_queue() {
        let mut session = Session::new();
        session.push_notice(Notice::warning("a"));
        session.push_notice(Notice::error("b"));
        let drained = session.drain_notices();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "a");
        assert!(session.notices().is_empty());
    }

    #[test]
    fn role_serialises_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
