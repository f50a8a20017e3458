//! Local model server (Ollama).
//!
//! Generation goes through `POST {endpoint}/api/generate` with streaming
//! disabled. Model discovery shells out to `ollama list`, the same way a
//! user would check what is installed.

use super::ChatModel;
use crate::error::ProviderError;
use crate::resources::ErrorTexts;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tracing::{debug, warn};

/// A model served by a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaModel {
    client: Client,
    endpoint: String,
    model: String,
    label: String,
    error_message: String,
}

impl OllamaModel {
    pub fn new(client: Client, endpoint: String, model: String, error_message: String) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            label: format!("Ollama ({model})"),
            model,
            error_message,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.endpoint)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl ChatModel for OllamaModel {
    fn label(&self) -> &str {
        &self.label
    }

    fn fallback_message(&self) -> &str {
        &self.error_message
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = self.generate_url();
        debug!("POST {} model={}", url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::LocalRunnerUnavailable {
                        endpoint: self.endpoint.clone(),
                        detail: e.to_string(),
                    }
                } else {
                    ProviderError::Transport {
                        provider: self.label.clone(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.label.clone(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedPayload {
                    provider: self.label.clone(),
                    detail: e.to_string(),
                })?;
        Ok(parsed.response)
    }
}

/// Names of the locally installed models.
///
/// Never fails: a missing `ollama` binary yields a one-element list with
/// the `file_not_found` text, and a failed listing yields the `list_error`
/// text, so a model picker always has something to show.
pub async fn list_local_models(errors: &ErrorTexts) -> Vec<String> {
    let output = tokio::process::Command::new("ollama")
        .arg("list")
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let models = parse_model_list(&String::from_utf8_lossy(&out.stdout));
            debug!("ollama list: {} models", models.len());
            models
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            warn!("ollama list failed: {}", stderr);
            vec![errors.list_error(&stderr)]
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("ollama binary not found");
            vec![errors.file_not_found.clone()]
        }
        Err(e) => {
            warn!("ollama list failed: {}", e);
            vec![errors.list_error(&e.to_string())]
        }
    }
}

/// First column of every row after the `NAME ...` header.
pub fn parse_model_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| *name != "NAME")
        .map(str::to_string)
        .collect()
}
