//! Question-answer API client.
//!
//! `GET <endpoint>?question=<text>` returns `{ "reply": "..." }`. Failures are never retried;
//! callers use `reply_or_fallback` to get a fixed apology instead.

use crate::config::AnswerConfig;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("answer request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("answer api error: {0}")]
    Api(String),
    #[error("answer api returned a malformed body: {0}")]
    MalformedBody(String),
}

/// Source of replies for incoming message text.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, AnswerError>;

    /// Text sent when `ask` fails.
    fn fallback_text(&self) -> &str;

    /// Ask, and on any failure log it and return the fallback text.
    async fn reply_or_fallback(&self, question: &str) -> String {
        match self.ask(question).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("answer: {}", e);
                self.fallback_text().to_string()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    reply: String,
}

/// HTTP client for the question-answer endpoint.
#[derive(Clone)]
pub struct AnswerClient {
    endpoint: String,
    fallback_text: String,
    client: reqwest::Client,
}

impl AnswerClient {
    pub fn new(config: &AnswerConfig) -> Result<Self, AnswerError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            endpoint: config.endpoint.trim().to_string(),
            fallback_text: config.fallback_text.clone(),
            client: builder.build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnswerBackend for AnswerClient {
    async fn ask(&self, question: &str) -> Result<String, AnswerError> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[("question", question)])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AnswerError::Api(format!("{} {}", status, body)));
        }
        let body = res.text().await?;
        let data: AnswerResponse =
            serde_json::from_str(&body).map_err(|e| AnswerError::MalformedBody(e.to_string()))?;
        if data.reply.trim().is_empty() {
            return Err(AnswerError::MalformedBody("empty reply".to_string()));
        }
        Ok(data.reply)
    }

    fn fallback_text(&self) -> &str {
        &self.fallback_text
    }
}
