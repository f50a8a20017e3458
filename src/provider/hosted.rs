//! Hosted chat-completions providers (OpenAI, DeepSeek).
//!
//! Both speak the same JSON shape:
//! `{model, messages:[{role, content}]}` in,
//! `{choices:[{message:{content}}]}` out, with a bearer credential.

use super::ChatModel;
use crate::error::ProviderError;
use crate::resources::ProviderMeta;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Cap on the error body echoed into notices.
const MAX_ERROR_BODY: usize = 300;

/// An OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct HostedModel {
    client: Client,
    display_name: String,
    label: String,
    api_url: String,
    credential_env: String,
    system_prompt: String,
    model: String,
    credential: Option<String>,
    temperature: Option<f32>,
    error_message: String,
}

impl HostedModel {
    pub fn new(
        client: Client,
        meta: &ProviderMeta,
        model: String,
        credential: Option<String>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            client,
            label: format!("{} ({})", meta.display_name, model),
            display_name: meta.display_name.clone(),
            api_url: meta.api_url.clone(),
            credential_env: meta.credential_env.clone().unwrap_or_default(),
            system_prompt: meta.system_prompt.clone(),
            model,
            credential,
            temperature,
            error_message: meta.error_message.clone(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ApiMessage {
                role: "system",
                content: &self.system_prompt,
            });
        }
        messages.push(ApiMessage {
            role: "user",
            content: prompt,
        });
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        }
    }
}

impl fmt::Debug for HostedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedModel")
            .field("label", &self.label)
            .field("api_url", &self.api_url)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[async_trait]
impl ChatModel for HostedModel {
    fn label(&self) -> &str {
        &self.label
    }

    fn fallback_message(&self) -> &str {
        &self.error_message
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let Some(ref key) = self.credential else {
            return Err(ProviderError::MissingCredential {
                provider: self.display_name.clone(),
                env: self.credential_env.clone(),
            });
        };

        debug!("POST {} model={}", self.api_url, self.model);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(key)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: self.display_name.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.display_name.clone(),
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ProviderError::Transport {
            provider: self.display_name.clone(),
            detail: e.to_string(),
        })?;
        parse_reply(&self.display_name, &bytes)
    }
}

/// Extract `choices[0].message.content` from a response body.
pub fn parse_reply(provider: &str, body: &[u8]) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::MalformedPayload {
            provider: provider.to_string(),
            detail: e.to_string(),
        })?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::EmptyChoices {
            provider: provider.to_string(),
        })?;
    Ok(choice.message.content.unwrap_or_default().trim().to_string())
}

fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('\u{2026}');
        out
    }
}

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
