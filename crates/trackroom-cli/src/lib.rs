//! HTTP client for the Trackroom service endpoints.
//!
//! Reads TRACKROOM_API_URL (or API_URL) and SERVICE_SECRET. Requests carry the secret
//! as a Bearer token when it is set.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use trackroom_core::StorageEvent;

const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Jobs run inside the request, so the timeout covers a full encode.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(900);

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("TRACKROOM_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let token = std::env::var("SERVICE_SECRET").ok();
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body (or none) and return the JSON response.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<Value> {
        let mut request = self.client.post(self.build_url(path));
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        response.json().await.context("Failed to parse response")
    }

    /// Send an object-created event for an existing object.
    pub async fn trigger(&self, bucket: &str, name: &str) -> Result<Value> {
        let event = StorageEvent::object_created(bucket, name);
        self.post("/hooks/storage", Some(&event)).await
    }

    /// Re-trigger every song missing a preview or waveform.
    pub async fn retrofix(&self) -> Result<Value> {
        self.post::<Value>("/admin/retrofix", None).await
    }
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
