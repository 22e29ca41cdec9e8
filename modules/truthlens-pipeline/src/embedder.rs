use async_trait::async_trait;
use tracing::{debug, warn};

use ai_client::EmbeddingsClient;
use truthlens_common::truncate_on_boundary;

use crate::traits::TextEmbedder;

/// Embedding dimensionality used across the pipeline.
pub const EMBEDDING_DIM: u32 = 384;

/// Inputs longer than this are truncated before encoding. Articles longer
/// than ~10k chars contribute little additional signal to a single vector,
/// and truncation keeps the per-article embedding cost flat.
pub const EMBED_CHAR_BUDGET: usize = 10_000;

pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Remote embedder used by both pipeline stages. Never errors toward the
/// caller: empty input or a failed call yields `None` and the article simply
/// goes without that vector.
pub struct Embedder {
    client: EmbeddingsClient,
}

impl Embedder {
    pub fn new(api_key: &str) -> Self {
        let client = EmbeddingsClient::new(api_key, EMBEDDING_MODEL).with_dimensions(EMBEDDING_DIM);
        Self { client }
    }
}

#[async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            debug!("Skipping embedding for empty text");
            return None;
        }

        let truncated = truncate_on_boundary(text, EMBED_CHAR_BUDGET);
        match self.client.embed(truncated).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, chars = truncated.len(), "Embedding request failed");
                None
            }
        }
    }

    fn model_id(&self) -> String {
        self.client.model().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TextEmbedder as _;

    #[tokio::test]
    async fn empty_input_short_circuits_to_none() {
        // No network call is made for empty or whitespace-only input.
        let embedder = Embedder::new("test-key");
        assert!(embedder.embed("").await.is_none());
        assert!(embedder.embed("   \n").await.is_none());
    }

    #[test]
    fn model_id_matches_configured_model() {
        let embedder = Embedder::new("test-key");
        assert_eq!(embedder.model_id(), EMBEDDING_MODEL);
    }
}
