//! Ollama configuration.

use serde::{Deserialize, Serialize};

/// Ollama client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server
    pub url: String,
    /// Model to generate with
    #[serde(default = "default_model")]
    pub model: String,
    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "tinyllama".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
