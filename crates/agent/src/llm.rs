use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parley_core::config::LlmConfig;
use parley_core::errors::{CoreError, CoreResult};

/// Single-shot text completion. Credentials are per call because every
/// tenant brings its own provider key.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, api_key: &str) -> CoreResult<String>;
}

/// Gemini `generateContent` client.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| CoreError::provider("completion", err))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<ContentPayload<'a>>,
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
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, api_key: &str) -> CoreResult<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateContentRequest {
            contents: vec![ContentPayload { parts: vec![TextPart { text: prompt }] }],
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|err| CoreError::provider("completion", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::provider(
                "completion",
                format!("provider returned {status}: {body}"),
            ));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|err| CoreError::provider("completion", err))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| CoreError::provider("completion", "provider returned no candidates"))?;

        Ok(text)
    }
}
