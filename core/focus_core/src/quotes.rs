use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are a motivational coach. Generate short, uplifting one-liners (maximum 2 sentences) for someone trying to stay focused and productive. Make them inspiring but not cheesy.";
const USER_PROMPT: &str = "Give me a motivational quote for a focus session";
const EMPTY_REPLY_QUOTE: &str = "Stay focused, you're doing amazing!";

pub const FALLBACK_QUOTES: [&str; 5] = [
    "Stay focused, you're doing amazing!",
    "Every moment of concentration brings you closer to your goals.",
    "Focus is the bridge between thought and accomplishment.",
    "You have the power to create extraordinary results through focused effort.",
    "Deep work creates deep rewards. Keep going!",
];

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quote service returned status {0}")]
    Status(u16),
    #[error("quote service returned no choices")]
    NoChoices,
}

/// Source of freshly generated quotes.
#[async_trait]
pub trait QuoteGenerator: Send + Sync {
    async fn generate(&self) -> Result<String, QuoteError>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsGenerator {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, QuoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("focus_core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl QuoteGenerator for ChatCompletionsGenerator {
    async fn generate(&self) -> Result<String, QuoteError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: USER_PROMPT,
                },
            ],
            max_tokens: 100,
            temperature: 0.8,
        };

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(QuoteError::Status(res.status().as_u16()));
        }

        let reply: ChatResponse = res.json().await?;
        let choice = reply.choices.into_iter().next().ok_or(QuoteError::NoChoices)?;
        let text = choice.message.content.unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            Ok(EMPTY_REPLY_QUOTE.to_string())
        } else {
            Ok(text.to_string())
        }
    }
}

/// Quote endpoint backend. Never fails: any generator problem degrades to a canned quote.
pub struct QuoteService {
    generator: Option<Box<dyn QuoteGenerator>>,
}

impl QuoteService {
    pub fn new(generator: Option<Box<dyn QuoteGenerator>>) -> Self {
        Self { generator }
    }

    pub async fn quote(&self) -> String {
        match &self.generator {
            Some(generator) => match generator.generate().await {
                Ok(q) => q,
                Err(err) => {
                    warn!("quote generation failed, using fallback: {err}");
                    fallback_quote()
                }
            },
            None => fallback_quote(),
        }
    }
}

pub fn fallback_quote() -> String {
    FALLBACK_QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(EMPTY_REPLY_QUOTE)
        .to_string()
}
