//! # Inference Transport
//!
//! [`InferenceTransport`] is the only networked seam in the crate. The
//! production implementation talks to an OpenAI-compatible
//! `/v1/chat/completions` endpoint:
//!
//! ```json
//! {
//!   "model": "gpt-4o",
//!   "messages": [{
//!     "role": "user",
//!     "content": [
//!       { "type": "text", "text": "<instruction>" },
//!       { "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,..." } }
//!     ]
//!   }]
//! }
//! ```
//!
//! and returns `choices[0].message.content` untouched. Interpreting that text
//! is the analysis client's job.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{StripError, StripResult};
use crate::processing::NormalizedImage;

/// One instruction plus one inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    pub instruction: String,
    pub image_data_uri: String,
}

impl InferenceRequest {
    pub fn new(instruction: impl Into<String>, image: &NormalizedImage) -> Self {
        Self {
            instruction: instruction.into(),
            image_data_uri: image.data_uri(),
        }
    }
}

/// A single request/response exchange with a multimodal model.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Send the request and return the first completion's text.
    async fn complete(&self, request: &InferenceRequest) -> StripResult<String>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Bearer-authenticated chat completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsTransport {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsTransport {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> StripResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("water-strip-analyzer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StripError::network_with_source("build http client", None, e))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The JSON body sent for `request`.
    pub fn request_body(&self, request: &InferenceRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.instruction },
                    { "type": "image_url", "image_url": { "url": request.image_data_uri } }
                ]
            }]
        })
    }
}

#[async_trait]
impl InferenceTransport for ChatCompletionsTransport {
    async fn complete(&self, request: &InferenceRequest) -> StripResult<String> {
        let body = self.request_body(request);
        debug!(endpoint = %self.endpoint, model = %self.model, "sending completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                StripError::network_with_source("send completion request", Some(self.endpoint.clone()), e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            StripError::network_with_source("read completion response", Some(self.endpoint.clone()), e)
        })?;

        if !status.is_success() {
            let snippet: String = text.chars().take(500).collect();
            return Err(StripError::http(status.as_u16(), snippet)
                .with_operation("chat completion")
                .with_recovery_suggestion(match status.as_u16() {
                    401 | 403 => "Check the configured API key",
                    429 => "The service is rate limiting; wait before the next capture",
                    _ => "Check the endpoint and model settings",
                }));
        }

        let completion: ChatCompletion = serde_json::from_str(&text)
            .map_err(|e| StripError::parse(format!("response is not a chat completion: {}", e)))?;
        debug!(choices = completion.choices.len(), "completion received");

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| StripError::parse("completion has no text content"))
    }
}
