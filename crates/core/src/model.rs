//! Language model collaborator.

use async_trait::async_trait;

use crate::error::Result;

/// Text completion backend used to synthesize insights.
///
/// Assumed to be slow and unreliable; callers wrap every call in a deadline.
#[async_trait]
pub trait InsightModel: Send + Sync {
    /// Returns a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs.
    fn name(&self) -> &str;
}
