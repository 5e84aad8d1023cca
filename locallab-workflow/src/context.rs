use async_trait::async_trait;
use locallab_core::{ContextProvider, CoreError, Result, RetrievedChunk};

/// Context provider used when no retrieval backend is wired in. RAG runs
/// against it fail individually, the experiment itself carries on.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledContextProvider;

#[async_trait]
impl ContextProvider for DisabledContextProvider {
    async fn retrieve(
        &self,
        collection_name: &str,
        _query: &str,
        _embedding_model: &str,
        _top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        Err(CoreError::Configuration(format!(
            "No retrieval backend configured for collection {}",
            collection_name
        )))
    }
}
