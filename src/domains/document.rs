use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored upload with its raw content and derived markdown rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub markdown: Option<String>,
    pub metadata: Option<Value>,
    pub folder: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A text-length-bounded slice of a document, optionally paired with an
/// embedding vector decoded from its stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: i32,
    pub document_id: i32,
    pub chunk_index: i32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: i32,
    pub document_id: i32,
    pub chunk_index: i32,
    pub content: String,
    pub score: f32,
}
