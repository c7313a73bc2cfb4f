//! Ollama HTTP client.

use crate::config::OllamaConfig;
use crate::types::{GenerateRequest, GenerateResponse, ListModelsResponse};
use async_trait::async_trait;
use sink_core::{Error, InsightModel, Result};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// Client for a local or remote Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    generate_url: Url,
    tags_url: Url,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Creates a new client. Fails on an unusable base URL.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| Error::configuration(format!("invalid Ollama URL {:?}: {}", config.url, e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "unsupported Ollama URL scheme: {}",
                base.scheme()
            )));
        }

        // Treat the configured path as a directory so joins keep any prefix.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |path: &str| {
            base.join(path)
                .map_err(|e| Error::configuration(format!("invalid Ollama URL: {}", e)))
        };
        let generate_url = join("api/generate")?;
        let tags_url = join("api/tags")?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            generate_url,
            tags_url,
            config,
        })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Lists the models available on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http_client
            .get(self.tags_url.clone())
            .send()
            .await
            .map_err(|e| Error::generation(format!("Ollama unavailable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::generation(format!(
                "Ollama returned {} for model list",
                response.status()
            )));
        }

        let body: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("invalid model list: {}", e)))?;

        Ok(body.models.into_iter().map(|m| m.name).collect())
    }

    /// Check Ollama reachability and whether the configured model is pulled.
    pub async fn check_connection(&self) -> bool {
        match self.list_models().await {
            Ok(models) => {
                let wanted = &self.config.model;
                // Ollama reports "tinyllama:latest" for a model pulled as "tinyllama".
                let available = models
                    .iter()
                    .any(|m| m == wanted || m.split(':').next() == Some(wanted.as_str()));
                if !available {
                    warn!(model = %wanted, available = ?models, "Configured model not pulled");
                }
                true
            }
            Err(e) => {
                error!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl InsightModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
        };

        debug!(
            url = %self.generate_url,
            model = %self.config.model,
            prompt_chars = prompt.len(),
            "Calling Ollama"
        );

        let response = self
            .http_client
            .post(self.generate_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("invalid Ollama response: {}", e)))?;

        if !body.done {
            debug!("Ollama response not marked done");
        }

        Ok(body.response)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
