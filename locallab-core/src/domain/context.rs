use serde::{Deserialize, Serialize};

use super::ids::DocumentId;

/// Maximum collection name length accepted by the vector store.
pub const MAX_COLLECTION_NAME_LEN: usize = 63;

/// A chunk of document text returned by retrieval, nearest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub content: String,
    pub distance: f64,
    pub index: usize,
}

/// Name of the vector collection holding `document_id` embedded with
/// `embedding_model`.
pub fn build_collection_name(document_id: &DocumentId, embedding_model: &str) -> String {
    let model: String = embedding_model
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let mut name = format!("doc_{}_{}", document_id.as_uuid().simple(), model);
    name.truncate(MAX_COLLECTION_NAME_LEN);
    name
}

/// Format retrieved chunks into a context block to prepend to a prompt.
pub fn assemble_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let body = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following context to answer.\n---------------------\n{}\n---------------------",
        body
    )
}
