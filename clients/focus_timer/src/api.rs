use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize};

use crate::model::{NewSession, Session, Settings, SettingsUpdate};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("core unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("core returned {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Deserialize)]
struct ErrBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Motivation {
    quote: String,
}

/// Where finished focus sessions are stored.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn record(&self, session: NewSession) -> Result<Session, ApiError>;
}

/// HTTP client for focus_core.
#[derive(Clone)]
pub struct CoreClient {
    client: Client,
    base_url: String,
}

impl CoreClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("focus_timer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn settings(&self) -> Result<Settings, ApiError> {
        let res = self.client.get(self.url("/api/settings")).send().await?;
        read_json(res).await
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings, ApiError> {
        let res = self
            .client
            .put(self.url("/api/settings"))
            .json(update)
            .send()
            .await?;
        read_json(res).await
    }

    pub async fn create_session(&self, session: &NewSession) -> Result<Session, ApiError> {
        let res = self
            .client
            .post(self.url("/api/session"))
            .json(session)
            .send()
            .await?;
        read_json(res).await
    }

    pub async fn sessions(&self) -> Result<Vec<Session>, ApiError> {
        let res = self.client.get(self.url("/api/session")).send().await?;
        read_json(res).await
    }

    pub async fn sessions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>, ApiError> {
        let res = self
            .client
            .get(self.url("/api/session/date-range"))
            .query(&[
                ("startDate", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("endDate", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ])
            .send()
            .await?;
        read_json(res).await
    }

    pub async fn motivation(&self) -> Result<String, ApiError> {
        let res = self.client.get(self.url("/api/motivation")).send().await?;
        let body: Motivation = read_json(res).await?;
        Ok(body.quote)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SessionSink for CoreClient {
    async fn record(&self, session: NewSession) -> Result<Session, ApiError> {
        self.create_session(&session).await
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json().await?);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrBody>(&text)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or(text);
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
