//! Text-completion client for the model-based matcher
//!
//! Sends the news text plus the candidate tag list to a chat-style
//! completion endpoint with a fixed system instruction constraining the
//! model to choose only from the supplied tags. The free-text reply is
//! parsed for tag substrings; this pass is best-effort and low precision
//! by design, so a malformed or empty reply yields no matches.

use crate::models::TagUniverse;
use crate::services::matchers::parse_model_selection;
use newscast_common::config::CompletionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const COMPLETION_TIMEOUT_SECS: u64 = 30;

const SYSTEM_INSTRUCTION: &str = "You are a tag classifier. You will be given \
a news title, the news content, and a list of candidate tags. Reply with the \
tags from the list that apply to the news, separated by commas. Only ever \
pick tags from the supplied list. If none apply, reply with nothing.";

/// Completion client errors
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion service error {0}")]
    Service(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completion service client
pub struct CompletionClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(COMPLETION_TIMEOUT_SECS))
            .build()
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Ask the model which of the candidate tags apply to the text.
    ///
    /// Only tags present in `universe` can ever be returned, regardless of
    /// what the model replies.
    pub async fn select_tags(
        &self,
        title: &str,
        content: &str,
        universe: &TagUniverse,
    ) -> Result<Vec<String>, CompletionError> {
        let tags = universe.tags();
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let user_message = format!(
            "Title: {}\nContent: {}\nCandidate tags: {}",
            title,
            content,
            tags.join(", ")
        );

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_INSTRUCTION.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message,
                },
            ],
        };

        let url = format!(
            "{}/chat/completions",
            self.config.url.trim_end_matches('/')
        );

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Service(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        let reply = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");

        tracing::debug!(reply = %reply, "Completion reply");

        Ok(parse_model_selection(reply, universe))
    }
}
