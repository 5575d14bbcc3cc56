use std::time::Duration;

use serde::{Deserialize, Serialize};

use parley_core::config::LlmConfig;
use parley_core::errors::{CoreError, CoreResult};

/// Embedding task type. Providers produce asymmetric vectors, so documents
/// and queries must be embedded in their matching mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingMode {
    Document,
    Query,
}

impl EmbeddingMode {
    fn task_type(self) -> &'static str {
        match self {
            Self::Document => "RETRIEVAL_DOCUMENT",
            Self::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Text to fixed-dimension vector. Credentials are per call because every
/// tenant brings its own provider key.
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str, mode: EmbeddingMode, api_key: &str) -> CoreResult<Vec<f32>>;
}

/// Gemini embedding API client.
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpEmbeddingClient {
    pub fn new(config: &LlmConfig) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| CoreError::provider("embedding", err))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
        })
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    content: ContentPayload<'a>,
    #[serde(rename = "taskType")]
    task_type: &'static str,
}

#[derive(Serialize)]
struct ContentPayload<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str, mode: EmbeddingMode, api_key: &str) -> CoreResult<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);

        let request = EmbedContentRequest {
            content: ContentPayload { parts: vec![TextPart { text }] },
            task_type: mode.task_type(),
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|err| CoreError::provider("embedding", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::provider(
                "embedding",
                format!("provider returned {status}: {body}"),
            ));
        }

        let parsed: EmbedContentResponse =
            response.json().await.map_err(|err| CoreError::provider("embedding", err))?;

        if parsed.embedding.values.is_empty() {
            return Err(CoreError::provider("embedding", "provider returned an empty vector"));
        }

        Ok(parsed.embedding.values)
    }
}

#[cfg(test)]
mod tests {
    use super::EmbeddingMode;

    #[test]
    fn task_types_match_provider_contract() {
        assert_eq!(EmbeddingMode::Document.task_type(), "RETRIEVAL_DOCUMENT");
        assert_eq!(EmbeddingMode::Query.task_type(), "RETRIEVAL_QUERY");
    }
}
