//! Ollama client implementing the insight model collaborator.

pub mod client;
pub mod config;
pub mod types;

pub use client::OllamaClient;
pub use config::OllamaConfig;
