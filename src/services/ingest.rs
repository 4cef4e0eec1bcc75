use std::sync::Arc;

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::domains::document::Document;
use crate::error::{CivicDeskError, Result};
use crate::interfaces::providers::{DocumentStore, LlmProvider, NewChunk};
use crate::services::chunker::{
    chunk_text, DEFAULT_CHUNK_OVERLAP_CHARS, DEFAULT_MAX_CHUNK_CHARS,
};
use crate::services::markdown::{derive_markdown, markdown_to_text};

#[derive(Debug, Clone, Default)]
pub struct UploadInput {
    pub title: String,
    pub content: String,
    pub folder: Option<String>,
    pub source_name: Option<String>,
}

/// Upload pipeline: derive markdown, chunk, embed each chunk with one
/// request per chunk, store everything.
pub struct IngestService {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn LlmProvider>,
    embedding_model: Option<String>,
    max_chunk_chars: usize,
    chunk_overlap_chars: usize,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn LlmProvider>,
        embedding_model: Option<String>,
        max_chunk_chars: Option<usize>,
        chunk_overlap_chars: Option<usize>,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model,
            max_chunk_chars: max_chunk_chars.unwrap_or(DEFAULT_MAX_CHUNK_CHARS),
            chunk_overlap_chars: chunk_overlap_chars.unwrap_or(DEFAULT_CHUNK_OVERLAP_CHARS),
        }
    }

    pub async fn ingest(&self, input: UploadInput) -> Result<Document> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(CivicDeskError::Config("document title is empty".to_string()));
        }
        let content = input.content.trim();
        if content.is_empty() {
            return Err(CivicDeskError::Config(
                "document content is empty".to_string(),
            ));
        }

        let markdown = derive_markdown(title, content);
        let plain = markdown_to_text(&markdown);

        let digest = Sha256::digest(content.as_bytes());
        let sha256: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        let metadata = json!({
            "source_name": input.source_name,
            "sha256": sha256,
            "bytes": content.len(),
            "words": plain.split_whitespace().count(),
        });

        let document = self
            .store
            .insert_document(
                title,
                content,
                Some(&markdown),
                Some(&metadata),
                input.folder.as_deref(),
            )
            .await?;

        let pieces = chunk_text(&plain, self.max_chunk_chars, self.chunk_overlap_chars);
        let mut chunks = Vec::with_capacity(pieces.len());
        for (index, piece) in pieces.into_iter().enumerate() {
            let embedding = match self
                .embedder
                .embed(vec![piece.clone()], self.embedding_model.as_deref())
                .await
            {
                Ok(vectors) => vectors.into_iter().next(),
                Err(err) => {
                    // Stored without a vector; the first search embeds it.
                    tracing::warn!(document_id = document.id, chunk = index, error = %err, "embedding failed at ingest");
                    None
                }
            };
            chunks.push(NewChunk {
                chunk_index: index as i32,
                content: piece,
                embedding,
                metadata: None,
            });
        }
        self.store.insert_chunks(document.id, chunks).await?;

        tracing::info!(document_id = document.id, title = %document.title, "document ingested");
        Ok(document)
    }
}
