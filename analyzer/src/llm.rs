use async_trait::async_trait;
use redwatch_core::{CoreError, LlmError, Post};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Body text sent to the model is truncated to this many characters.
const BODY_EXCERPT_LEN: usize = 500;

/// External relevance scorer. Implementations return a 0.0–1.0 judgment of
/// how relevant a post is to the configured keywords.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn relevance_score(&self, post: &Post, keywords: &[String]) -> Result<f64, CoreError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Relevance scoring via the OpenAI chat completions API.
pub struct OpenAiProvider {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point requests somewhere else (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_prompt(post: &Post, keywords: &[String]) -> String {
        let excerpt: String = post.selftext.chars().take(BODY_EXCERPT_LEN).collect();

        format!(
            "Post Title: {}\nPost Content: {}\n\nKeywords I care about: {}\n\n\
             Rate how relevant this post is to those keywords on a scale of 0-1.\n\
             Respond with just a number between 0 and 1.",
            post.title,
            excerpt,
            keywords.join(", ")
        )
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn relevance_score(&self, post: &Post, keywords: &[String]) -> Result<f64, CoreError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::build_prompt(post, keywords),
            }],
            temperature: 0.3,
            max_tokens: 8,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            200 => {}
            401 | 403 => {
                return Err(CoreError::Llm(LlmError::AuthenticationFailed {
                    provider: "openai".to_string(),
                }))
            }
            429 => {
                return Err(CoreError::Llm(LlmError::RateLimitExceeded {
                    provider: "openai".to_string(),
                }))
            }
            _ if status.is_server_error() => {
                return Err(CoreError::Llm(LlmError::ServiceUnavailable {
                    provider: "openai".to_string(),
                }))
            }
            _ => {
                return Err(CoreError::Llm(LlmError::InvalidResponseFormat {
                    provider: "openai".to_string(),
                }))
            }
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            warn!(%e, "malformed chat completion response");
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: "openai".to_string(),
            })
        })?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        // A model that answers with anything but a bare number counts as
        // undecided, not as an error.
        let score = content.parse::<f64>().unwrap_or(0.5).clamp(0.0, 1.0);
        debug!(reddit_id = %post.reddit_id, score, "LLM relevance score");
        Ok(score)
    }
}
