use anyhow::{anyhow, Result};
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::environment::AiSettings;
use crate::TARGET_LLM_REQUEST;

const LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat completion client for an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct LLMClient {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl LLMClient {
    /// Returns `None` when AI is disabled in the configuration.
    pub fn from_settings(settings: &AiSettings) -> Option<Self> {
        if !settings.enabled {
            info!(target: TARGET_LLM_REQUEST, "AI completion disabled");
            return None;
        }

        let mut config = OpenAIConfig::new();
        if let Some(api_key) = &settings.api_key {
            config = config.with_api_key(api_key);
        }
        if let Some(base_url) = &settings.base_url {
            config = config.with_api_base(base_url);
        }

        info!(target: TARGET_LLM_REQUEST, "AI completion enabled with model {}", settings.model);
        Some(LLMClient {
            client: OpenAIClient::with_config(config),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system + user exchange and returns the first choice's text.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        debug!(target: TARGET_LLM_REQUEST, "Sending completion request to {} ({} prompt chars)", self.model, prompt.chars().count());

        let response = match timeout(LLM_TIMEOUT, self.client.chat().create(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                error!(target: TARGET_LLM_REQUEST, "Completion request failed: {}", err);
                return Err(err.into());
            }
            Err(_) => {
                error!(target: TARGET_LLM_REQUEST, "Completion request timed out after {:?}", LLM_TIMEOUT);
                return Err(anyhow!("AI completion timed out"));
            }
        };

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("AI completion returned no content"))?;

        debug!(target: TARGET_LLM_REQUEST, "Completion received ({} chars)", text.chars().count());
        Ok(text)
    }
}

/// Title and body split out of a generated article.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArticle {
    pub title: String,
    pub content: String,
}

/// Splits a completion into title and body. The first non-blank line is the
/// title when it is a markdown heading or starts with `标题：`/`标题:`.
pub fn split_generated_article(text: &str, fallback_title: &str) -> GeneratedArticle {
    let trimmed = text.trim();
    let (first, rest) = match trimmed.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest.trim()),
        None => (trimmed, ""),
    };

    let title = first
        .strip_prefix("标题：")
        .or_else(|| first.strip_prefix("标题:"))
        .or_else(|| {
            first
                .starts_with('#')
                .then(|| first.trim_start_matches('#'))
        })
        .map(str::trim)
        .filter(|title| !title.is_empty());

    match title {
        Some(title) if !rest.is_empty() => GeneratedArticle {
            title: title.to_string(),
            content: rest.to_string(),
        },
        _ => GeneratedArticle {
            title: fallback_title.to_string(),
            content: trimmed.to_string(),
        },
    }
}
