use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, RwLock};

use crate::domains::document::{ChunkRecord, ScoredChunk};
use crate::error::Result;
use crate::interfaces::providers::{DocumentStore, LlmProvider};

pub const DEFAULT_TOP_K: usize = 5;

struct CachedChunk {
    id: i32,
    document_id: i32,
    chunk_index: i32,
    content: String,
    embedding: Option<Vec<f32>>,
}

/// Brute-force cosine-similarity search over chunk embeddings.
///
/// Chunks are held in a process-lifetime map keyed by document id that is
/// rebuilt from the store on every cold reference. Chunks without a stored
/// embedding are embedded during the scan, one request at a time, and the
/// vector is written back.
pub struct RetrievalService {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn LlmProvider>,
    embedding_model: Option<String>,
    min_score: f32,
    chunk_cache: RwLock<HashMap<i32, Arc<Vec<CachedChunk>>>>,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl RetrievalService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn LlmProvider>,
        embedding_model: Option<String>,
        min_score: Option<f32>,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model,
            min_score: min_score.unwrap_or(0.0),
            chunk_cache: RwLock::new(HashMap::new()),
            query_cache: Mutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        document_id: Option<i32>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.query_embedding(query).await?;

        let document_ids = match document_id {
            Some(id) => vec![id],
            None => {
                let documents = self.store.list_documents(None).await?;
                documents.into_iter().map(|d| d.id).collect()
            }
        };

        let mut scored = Vec::new();
        for doc_id in document_ids {
            let chunks = self.document_chunks(doc_id).await?;
            for chunk in chunks.iter() {
                let Some(embedding) = &chunk.embedding else {
                    continue;
                };
                let score = cosine_similarity(&query_vector, embedding);
                if score >= self.min_score {
                    scored.push(ScoredChunk {
                        chunk_id: chunk.id,
                        document_id: chunk.document_id,
                        chunk_index: chunk.chunk_index,
                        content: chunk.content.clone(),
                        score,
                    });
                }
            }
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));
        Ok(scored)
    }

    /// Drop a document's cache entry; the next reference rebuilds it.
    pub async fn invalidate(&self, document_id: i32) {
        self.chunk_cache.write().await.remove(&document_id);
    }

    async fn query_embedding(&self, query: &str) -> Result<Vec<f32>> {
        let model_key = self.embedding_model.as_deref().unwrap_or("default");
        let cache_key = format!("{model_key}:{query}");
        {
            let mut cache = self.query_cache.lock().await;
            if let Some(vector) = cache.get(&cache_key) {
                return Ok(vector.clone());
            }
        }
        let vectors = self
            .embedder
            .embed(vec![query.to_string()], self.embedding_model.as_deref())
            .await?;
        let vector = vectors.into_iter().next().unwrap_or_default();
        let mut cache = self.query_cache.lock().await;
        cache.put(cache_key, vector.clone());
        Ok(vector)
    }

    async fn document_chunks(&self, document_id: i32) -> Result<Arc<Vec<CachedChunk>>> {
        {
            let cache = self.chunk_cache.read().await;
            if let Some(chunks) = cache.get(&document_id) {
                if chunks.iter().all(|c| c.embedding.is_some()) {
                    return Ok(Arc::clone(chunks));
                }
            }
        }

        let records = self.store.chunks_for_document(document_id).await?;
        let mut chunks = Vec::with_capacity(records.len());
        for record in records {
            let embedding = match record.embedding {
                Some(vector) => Some(vector),
                None => {
                    let vector = self.embed_and_store(&record).await?;
                    Some(vector)
                }
            };
            chunks.push(CachedChunk {
                id: record.id,
                document_id: record.document_id,
                chunk_index: record.chunk_index,
                content: record.content,
                embedding,
            });
        }

        let chunks = Arc::new(chunks);
        self.chunk_cache
            .write()
            .await
            .insert(document_id, Arc::clone(&chunks));
        Ok(chunks)
    }

    async fn embed_and_store(&self, record: &ChunkRecord) -> Result<Vec<f32>> {
        let vectors = self
            .embedder
            .embed(
                vec![record.content.clone()],
                self.embedding_model.as_deref(),
            )
            .await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::CivicDeskError::Runtime("No embedding data".to_string()))?;
        self.store.set_chunk_embedding(record.id, &vector).await?;
        Ok(vector)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_or_zero_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
