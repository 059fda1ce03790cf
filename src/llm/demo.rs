/// Offline stand-in that returns numbered sample tags.
///
/// Lets the whole flow (normalization, review, insertion) be tried without an
/// API key or network access.
use async_trait::async_trait;

use super::client::{LlmError, TagModel};
use super::protocol::TagSuggestionRequest;

const DEFAULT_SAMPLE_COUNT: usize = 5;

#[derive(Debug, Clone)]
pub struct DemoClient {
    count: usize,
}

impl Default for DemoClient {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_COUNT)
    }
}

impl DemoClient {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

#[async_trait]
impl TagModel for DemoClient {
    fn label(&self) -> String {
        "demo mode (sample tags)".to_string()
    }

    async fn generate_tags(
        &self,
        _request: &TagSuggestionRequest,
    ) -> Result<Vec<String>, LlmError> {
        Ok((1..=self.count).map(|i| format!("sample tag {i}")).collect())
    }
}
