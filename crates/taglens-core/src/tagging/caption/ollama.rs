//! Ollama vision model captioner.
//!
//! Talks to a local Ollama instance via its HTTP API. No authentication
//! required; just needs Ollama running with a vision model pulled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CaptionConfig;
use crate::error::{PipelineError, PipelineResult};

use super::generator::{CaptionModel, CaptionRequest, Sampling};

/// Captioner backed by Ollama's `/api/generate`.
pub struct OllamaCaptioner {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaCaptioner {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &CaptionConfig) -> Self {
        Self::new(&config.endpoint, &config.model)
    }
}

/// Ollama /api/generate request body.
#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: [&'a str; 1],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug, PartialEq)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl OllamaOptions {
    fn for_request(request: &CaptionRequest) -> Self {
        match request.sampling {
            Sampling::Deterministic { seed } => Self {
                temperature: 0.0,
                num_predict: request.max_tokens,
                seed,
                top_k: None,
                top_p: None,
            },
            Sampling::Stochastic {
                temperature,
                top_k,
                top_p,
                seed,
            } => Self {
                temperature,
                num_predict: request.max_tokens,
                seed,
                top_k: Some(top_k),
                top_p: Some(top_p),
            },
        }
    }
}

/// Ollama /api/generate response.
#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl CaptionModel for OllamaCaptioner {
    fn name(&self) -> &str {
        &self.model
    }

    async fn caption(&self, request: &CaptionRequest) -> PipelineResult<String> {
        let url = format!("{}/api/generate", self.endpoint);

        let body = OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            images: [request.image.data.as_str()],
            stream: false,
            options: OllamaOptions::for_request(request),
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let what = if e.is_timeout() {
                    "timed out"
                } else if e.is_connect() {
                    "could not connect"
                } else {
                    "failed"
                };
                PipelineError::Caption {
                    message: format!("Ollama request {what}: {e}"),
                    status_code: None,
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Caption {
                message: format!("Ollama HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let ollama_resp: OllamaResponse =
            resp.json().await.map_err(|e| PipelineError::Caption {
                message: format!("Failed to parse Ollama response: {e}"),
                status_code: None,
            })?;

        Ok(ollama_resp.response.trim().to_string())
    }
}
