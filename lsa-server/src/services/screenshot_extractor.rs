//! End-of-live screenshot metric extraction
//!
//! Screenshots uploaded when finishing a session are sent to the AI
//! extraction service. Whatever counters it recognizes come back as
//! [`AiMetrics`]; fields it could not read stay `None`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lsa_common::config::ExtractorConfig;
use reqwest::{header, Client};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::AiMetrics;

/// One uploaded image
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Extractor request failed: {0}")]
    Network(String),

    #[error("Extractor returned error: {0}")]
    Api(String),

    #[error("Malformed extractor response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ScreenshotExtractor: Send + Sync {
    async fn extract(&self, screenshots: &[Screenshot]) -> Result<AiMetrics, ExtractorError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload<'a> {
    file_name: Option<&'a str>,
    content_type: Option<&'a str>,
    data: String,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    images: Vec<ImagePayload<'a>>,
}

pub struct HttpScreenshotExtractor {
    http_client: Client,
    endpoint: String,
}

impl HttpScreenshotExtractor {
    pub fn new(endpoint: String, config: &ExtractorConfig) -> Result<Self, ExtractorError> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ExtractorError::Api(format!("Invalid API key header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| ExtractorError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl ScreenshotExtractor for HttpScreenshotExtractor {
    async fn extract(&self, screenshots: &[Screenshot]) -> Result<AiMetrics, ExtractorError> {
        let images = screenshots
            .iter()
            .map(|s| ImagePayload {
                file_name: s.file_name.as_deref(),
                content_type: s.content_type.as_deref(),
                data: STANDARD.encode(&s.bytes),
            })
            .collect();

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&ExtractRequest { images })
            .send()
            .await
            .map_err(|e| ExtractorError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractorError::Api(format!("{}: {}", status, body)));
        }

        let metrics: AiMetrics = response
            .json()
            .await
            .map_err(|e| ExtractorError::Malformed(e.to_string()))?;
        metrics
            .validate()
            .map_err(|e| ExtractorError::Malformed(e.to_string()))?;

        Ok(metrics)
    }
}
