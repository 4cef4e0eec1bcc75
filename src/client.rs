use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::domains::chat::{Chat, ChatMessage};
use crate::domains::document::{Document, ScoredChunk};
use crate::error::{CivicDeskError, Result};
use crate::factories::desk_factory::CivicDeskFactory;
use crate::interfaces::providers::DocumentStore;
use crate::services::analysis::{
    analyze_document, compare_analyses, AnalysisComparison, DocumentAnalysis,
};
use crate::services::ingest::{IngestService, UploadInput};
use crate::services::query::{QueryService, RagAnswer};
use crate::services::retrieval::RetrievalService;

/// Facade over the document store and the ingest/retrieval/query services.
pub struct CivicDesk {
    store: Arc<dyn DocumentStore>,
    ingest: IngestService,
    retrieval: Arc<RetrievalService>,
    query: QueryService,
}

impl std::fmt::Debug for CivicDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CivicDesk").finish_non_exhaustive()
    }
}

impl CivicDesk {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ingest: IngestService,
        retrieval: Arc<RetrievalService>,
        query: QueryService,
    ) -> Self {
        Self {
            store,
            ingest,
            retrieval,
            query,
        }
    }

    pub async fn from_config(config: Config) -> Result<Self> {
        CivicDeskFactory::create_from_config(config).await
    }

    pub async fn from_config_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::from_file(path)?;
        Self::from_config(config).await
    }

    pub async fn upload_document(&self, input: UploadInput) -> Result<Document> {
        let document = self.ingest.ingest(input).await?;
        self.retrieval.invalidate(document.id).await;
        Ok(document)
    }

    pub async fn list_documents(&self, folder: Option<&str>) -> Result<Vec<Document>> {
        self.store.list_documents(folder).await
    }

    pub async fn get_document(&self, id: i32) -> Result<Document> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound(format!("document {id}")))
    }

    pub async fn delete_document(&self, id: i32) -> Result<()> {
        if !self.store.delete_document(id).await? {
            return Err(CivicDeskError::NotFound(format!("document {id}")));
        }
        self.retrieval.invalidate(id).await;
        Ok(())
    }

    pub async fn move_document(&self, id: i32, folder: Option<&str>) -> Result<Document> {
        self.store
            .move_document(id, folder)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound(format!("document {id}")))
    }

    pub async fn analyze_document(&self, id: i32) -> Result<DocumentAnalysis> {
        let document = self.get_document(id).await?;
        Ok(analyze_document(&document))
    }

    pub async fn compare_documents(&self, left: i32, right: i32) -> Result<AnalysisComparison> {
        let left = self.analyze_document(left).await?;
        let right = self.analyze_document(right).await?;
        Ok(compare_analyses(&left, &right))
    }

    pub async fn create_chat(&self, document_id: i32, title: &str) -> Result<Chat> {
        self.get_document(document_id).await?;
        self.store.create_chat(document_id, title).await
    }

    pub async fn list_chats(&self, document_id: i32) -> Result<Vec<Chat>> {
        self.get_document(document_id).await?;
        self.store.list_chats(document_id).await
    }

    pub async fn delete_chat(&self, chat_id: i32) -> Result<()> {
        if !self.store.delete_chat(chat_id).await? {
            return Err(CivicDeskError::NotFound(format!("chat {chat_id}")));
        }
        Ok(())
    }

    pub async fn chat_messages(&self, chat_id: i32, limit: usize) -> Result<Vec<ChatMessage>> {
        self.store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound(format!("chat {chat_id}")))?;
        self.store.list_messages(chat_id, limit).await
    }

    pub async fn post_message(&self, chat_id: i32, text: &str) -> Result<ChatMessage> {
        self.query.answer_in_chat(chat_id, text).await
    }

    pub async fn search(
        &self,
        query: &str,
        document_id: Option<i32>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if let Some(id) = document_id {
            self.get_document(id).await?;
        }
        self.retrieval.search(query, document_id, limit).await
    }

    pub async fn ask(&self, document_id: i32, question: &str) -> Result<RagAnswer> {
        self.query.ask(document_id, question).await
    }
}
