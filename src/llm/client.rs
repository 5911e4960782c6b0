use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::{debug, info};
use serde_json::json;
use thiserror::Error;

use crate::config::{LanguageConfig, LlmConfig, LlmProvider};

use super::prompts;
use super::response;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("backend rate limited the request")]
    RateLimited,
    #[error("backend rejected the credentials")]
    Unauthorized,
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

/// One glossary pair for a word judged non-trivial at the configured level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub term: String,
    pub translation: String,
}

/// A rewritten article with its glossary.
/// Glossary order follows first appearance in the rewritten text; terms are
/// unique, a repeated term keeps its first translation.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub text: String,
    pub glossary: Vec<GlossaryEntry>,
}

/// Capability interface over the language-generation backend.
/// The orchestrator depends only on this trait, never on a concrete client.
pub trait GenerationClient: Send + Sync {
    /// Rewrite one article at the target language and level.
    /// Any failure is recoverable per-article: siblings keep going.
    fn transform_article<'a>(
        &'a self,
        text: &'a str,
        language: &'a LanguageConfig,
    ) -> Pin<Box<dyn Future<Output = Result<TransformResult, GenerationError>> + Send + 'a>>;

    /// Generate the digest introduction from the final ordered list of
    /// already-transformed article texts. Must not be called with partial
    /// or in-flight data.
    fn generate_introduction<'a>(
        &'a self,
        language: &'a LanguageConfig,
        article_texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}

/// Factory: build the client variant selected by the configuration.
pub fn create_generation_client(config: &LlmConfig) -> Arc<dyn GenerationClient> {
    info!("Creating generation client for provider: {:?}", config.provider);
    match config.provider {
        LlmProvider::Claude => Arc::new(ClaudeClient::new(config.clone())),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(config.clone())),
        LlmProvider::Perplexity => {
            Arc::new(OpenAiClient::with_base_url(config.clone(), PERPLEXITY_BASE_URL))
        }
    }
}

fn map_status(status: reqwest::StatusCode) -> GenerationError {
    match status.as_u16() {
        401 | 403 => GenerationError::Unauthorized,
        // 529 is Anthropic's "overloaded", retryable like a rate limit
        429 | 529 => GenerationError::RateLimited,
        other => GenerationError::Unreachable(format!("HTTP status {}", other)),
    }
}

// ============================================================================
// Claude (Anthropic Messages API)
// ============================================================================

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";

pub struct ClaudeClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ClaudeClient {
    pub fn new(config: LlmConfig) -> Self {
        ClaudeClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or(DEFAULT_CLAUDE_MODEL)
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        debug!("Sending request to Claude: {}", self.model());

        let body = json!({
            "model": self.model(),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self.http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = value["content"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::InvalidResponse("reply has no content[0].text".to_string())
            })?;

        Ok(text.to_string())
    }
}

impl GenerationClient for ClaudeClient {
    fn transform_article<'a>(
        &'a self,
        text: &'a str,
        language: &'a LanguageConfig,
    ) -> Pin<Box<dyn Future<Output = Result<TransformResult, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let reply = self
                .complete(
                    prompts::TRANSFORM_SYSTEM_PROMPT,
                    &prompts::transform_prompt(text, language),
                )
                .await?;
            response::parse_transform_reply(&reply)
        })
    }

    fn generate_introduction<'a>(
        &'a self,
        language: &'a LanguageConfig,
        article_texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let reply = self
                .complete(
                    prompts::INTRODUCTION_SYSTEM_PROMPT,
                    &prompts::introduction_prompt(language, article_texts),
                )
                .await?;
            response::parse_introduction_reply(&reply)
        })
    }
}

// ============================================================================
// OpenAI (chat completions, also used for OpenAI-compatible providers)
// ============================================================================

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_PERPLEXITY_MODEL: &str = "sonar-pro";

pub struct OpenAiClient {
    http: reqwest::Client,
    config: LlmConfig,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        Self::with_base_url(config, OPENAI_BASE_URL)
    }

    /// OpenAI-compatible endpoint at a different base URL (Perplexity)
    pub fn with_base_url(config: LlmConfig, base_url: &str) -> Self {
        OpenAiClient {
            http: reqwest::Client::new(),
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn model(&self) -> &str {
        match self.config.model.as_deref() {
            Some(model) => model,
            None if self.base_url == PERPLEXITY_BASE_URL => DEFAULT_PERPLEXITY_MODEL,
            None => DEFAULT_OPENAI_MODEL,
        }
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        debug!("Sending request to {}: {}", self.base_url, self.model());

        let body = json!({
            "model": self.model(),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
        });

        let response = self.http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::InvalidResponse(
                    "reply has no choices[0].message.content".to_string(),
                )
            })?;

        Ok(text.to_string())
    }
}

impl GenerationClient for OpenAiClient {
    fn transform_article<'a>(
        &'a self,
        text: &'a str,
        language: &'a LanguageConfig,
    ) -> Pin<Box<dyn Future<Output = Result<TransformResult, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let reply = self
                .complete(
                    prompts::TRANSFORM_SYSTEM_PROMPT,
                    &prompts::transform_prompt(text, language),
                )
                .await?;
            response::parse_transform_reply(&reply)
        })
    }

    fn generate_introduction<'a>(
        &'a self,
        language: &'a LanguageConfig,
        article_texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let reply = self
                .complete(
                    prompts::INTRODUCTION_SYSTEM_PROMPT,
                    &prompts::introduction_prompt(language, article_texts),
                )
                .await?;
            response::parse_introduction_reply(&reply)
        })
    }
}
