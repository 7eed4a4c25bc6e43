use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::collaborators::{Completion, RoadmapGenerator};
use crate::constants;
use crate::error::CollaboratorError;
use crate::prompts;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: constants::DEFAULT_GEMINI_MODEL.to_string(),
            base_url: constants::GEMINI_API_URL.clone(),
            timeout: Duration::from_secs(constants::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// Structures matching Gemini's models/{model}:generateContent endpoint
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini text generation; serves both as the roadmap generator and the
/// general prompt-completion service.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(constants::USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CollaboratorError::NotConfigured("GEMINI_API_KEY"))?;

        let url = self.endpoint();
        let request_payload = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        debug!(prompt_len = prompt.len(), %url, "Sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request_payload)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Gemini API request failed");
            return Err(CollaboratorError::Status { status, body });
        }

        let generated = response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| CollaboratorError::Response(format!("invalid Gemini JSON: {e}")))?;

        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CollaboratorError::Response(
                "Gemini returned no text".to_string(),
            ));
        }
        debug!(response_len = text.len(), "Received Gemini response");
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Completion for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.generate(prompt).await
    }
}

#[async_trait]
impl RoadmapGenerator for GeminiClient {
    async fn generate_roadmap(&self, topic: &str) -> Result<String, CollaboratorError> {
        self.generate(&prompts::roadmap(topic)).await
    }
}

/// Client-side timeouts become [`CollaboratorError::Timeout`] so callers can
/// tell them apart from other transport failures.
pub(crate) fn map_transport_error(err: reqwest::Error, timeout: Duration) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout(timeout)
    } else {
        CollaboratorError::Http(err)
    }
}
