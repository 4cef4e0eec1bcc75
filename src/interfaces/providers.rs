use async_trait::async_trait;
use serde_json::Value;

use crate::domains::chat::{Chat, ChatMessage};
use crate::domains::document::{ChunkRecord, Document};
use crate::error::Result;

/// A chunk prepared by the ingest pipeline, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i32,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String>;

    async fn parse_structured_output(
        &self,
        prompt: &str,
        system_prompt: &str,
        json_schema: Value,
    ) -> Result<Value>;

    async fn embed(&self, inputs: Vec<String>, model: Option<&str>) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(
        &self,
        title: &str,
        content: &str,
        markdown: Option<&str>,
        metadata: Option<&Value>,
        folder: Option<&str>,
    ) -> Result<Document>;
    async fn get_document(&self, id: i32) -> Result<Option<Document>>;
    async fn list_documents(&self, folder: Option<&str>) -> Result<Vec<Document>>;
    async fn delete_document(&self, id: i32) -> Result<bool>;
    async fn move_document(&self, id: i32, folder: Option<&str>) -> Result<Option<Document>>;

    async fn insert_chunks(&self, document_id: i32, chunks: Vec<NewChunk>) -> Result<()>;
    async fn chunks_for_document(&self, document_id: i32) -> Result<Vec<ChunkRecord>>;
    async fn all_chunks(&self) -> Result<Vec<ChunkRecord>>;
    async fn set_chunk_embedding(&self, chunk_id: i32, embedding: &[f32]) -> Result<()>;

    async fn create_chat(&self, document_id: i32, title: &str) -> Result<Chat>;
    async fn get_chat(&self, id: i32) -> Result<Option<Chat>>;
    async fn list_chats(&self, document_id: i32) -> Result<Vec<Chat>>;
    async fn delete_chat(&self, id: i32) -> Result<bool>;

    async fn append_message(&self, chat_id: i32, role: &str, content: &str)
        -> Result<ChatMessage>;
    async fn list_messages(&self, chat_id: i32, limit: usize) -> Result<Vec<ChatMessage>>;
}
