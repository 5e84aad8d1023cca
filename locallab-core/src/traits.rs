use async_trait::async_trait;

use crate::domain::{
    assemble_context, build_collection_name, DocumentId, Experiment, ExperimentId,
    ExperimentRun, ExperimentStatus, GenerationRequest, GenerationResponse, RetrievedChunk,
    RunId,
};
use crate::error::Result;

#[async_trait]
pub trait Repository<T: Send + Sync, ID: Send + Sync>: Send + Sync {
    async fn find_by_id(&self, id: &ID) -> Result<Option<T>>;
    async fn save(&self, entity: &T) -> Result<T>;
    async fn delete(&self, id: &ID) -> Result<()>;
}

#[async_trait]
pub trait ExperimentStore: Repository<Experiment, ExperimentId> {
    async fn list(&self) -> Result<Vec<Experiment>>;

    /// Persist a status change without touching the rest of the record.
    async fn update_status(&self, id: &ExperimentId, status: ExperimentStatus) -> Result<()>;
}

#[async_trait]
pub trait RunStore: Repository<ExperimentRun, RunId> {
    /// All runs of an experiment, ordered by iteration and then creation time.
    async fn find_by_experiment_id(&self, experiment_id: &ExperimentId)
        -> Result<Vec<ExperimentRun>>;
}

/// Synchronous (request/response) text generation against a model server.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;
}

/// Retrieval side of the RAG pipeline, consumed as a black box.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn retrieve(
        &self,
        collection_name: &str,
        query: &str,
        embedding_model: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    fn collection_name(&self, document_id: &DocumentId, embedding_model: &str) -> String {
        build_collection_name(document_id, embedding_model)
    }

    fn assemble_context(&self, chunks: &[RetrievedChunk]) -> String {
        assemble_context(chunks)
    }
}
