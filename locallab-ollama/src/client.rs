//! HTTP client for the Ollama API
//!
//! Generation requests are sent once; only failures to connect are retried,
//! with exponential backoff.

use crate::config::OllamaConfig;
use crate::error::{OllamaError, OllamaResult};
use crate::types::{GenerateRequest, GenerateResponse, ModelInfo, TagsResponse};
use async_trait::async_trait;
use locallab_core::{GenerationRequest, GenerationResponse, InferenceClient};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    config: Arc<OllamaConfig>,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> OllamaResult<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Build the full URL for an endpoint
    pub fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Run one non-streaming generation and return the raw Ollama payload.
    pub async fn generate_raw(&self, request: &GenerateRequest) -> OllamaResult<GenerateResponse> {
        let url = self.url("/api/generate");
        debug!(model = %request.model, "POST {}", url);

        let response = self
            .send_with_retry(|| self.client.post(&url).json(request))
            .await?;
        Self::decode(response).await
    }

    /// Models available on the server (`GET /api/tags`).
    pub async fn list_models(&self) -> OllamaResult<Vec<ModelInfo>> {
        let url = self.url("/api/tags");
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        let tags: TagsResponse = Self::decode(response).await?;
        Ok(tags.models)
    }

    async fn send_with_retry<F>(&self, build: F) -> OllamaResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempts = 0;
        let mut backoff = self.config.retry_initial_backoff;

        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let err = self.classify(e);
                    if !err.is_retryable() || attempts >= self.config.max_retries {
                        return Err(err);
                    }

                    attempts += 1;
                    info!(
                        "Retrying Ollama request (attempt {}/{}), waiting {:?}",
                        attempts, self.config.max_retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.config.retry_max_backoff);
                }
            }
        }
    }

    fn classify(&self, err: reqwest::Error) -> OllamaError {
        if err.is_timeout() {
            warn!("Ollama request timed out: {}", err);
            OllamaError::Timeout(self.config.timeout.as_secs())
        } else if err.is_connect() {
            warn!("Ollama connection failed: {}", err);
            OllamaError::Connection(err.to_string())
        } else {
            OllamaError::Http(err)
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> OllamaResult<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OllamaError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(OllamaError::from_response(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| OllamaError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, request: GenerationRequest) -> locallab_core::Result<GenerationResponse> {
        let started = Instant::now();
        let body = GenerateRequest::from(request);

        let raw = self.generate_raw(&body).await?;
        let wall_clock_ms = started.elapsed().as_millis() as u64;

        Ok(raw.into_generation_response(wall_clock_ms))
    }
}
