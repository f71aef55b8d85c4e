//! services/api/src/adapters/groq_llm.rs
//!
//! This module contains the adapter for the plan, summary and quiz LLM.
//! It implements the `CompletionService` port against Groq's OpenAI-compatible
//! chat completions endpoint.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use study_planner_core::{
    ports::{CompletionService, PortError, PortResult},
    prompt::Prompt,
};
use tracing::{debug, warn};

const TEMPERATURE: f32 = 0.7;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` using Groq's OpenAI-compatible API.
#[derive(Clone)]
pub struct GroqCompletionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl GroqCompletionAdapter {
    /// Creates a new `GroqCompletionAdapter`. `timeout` bounds every call.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for GroqCompletionAdapter {
    async fn complete(&self, prompt: &Prompt) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(prompt.max_tokens)
            .temperature(TEMPERATURE)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, max_tokens = prompt.max_tokens, "Sending completion request");

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Completion request timed out");
                PortError::Timeout(format!(
                    "LLM did not answer within {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            PortError::Upstream("LLM returned no choices in its response.".to_string())
        })?;

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(PortError::Upstream(
                "LLM response contained no text content.".to_string(),
            )),
        }
    }
}
