use std::sync::Arc;

use crate::client::CivicDesk;
use crate::config::{Config, ProviderConfig};
use crate::error::{CivicDeskError, Result};
use crate::interfaces::providers::{DocumentStore, LlmProvider};
use crate::providers::openai::{OpenAiProvider, DEEPSEEK_BASE_URL};
use crate::providers::sqlite::SqliteDocumentStore;
use crate::services::ingest::IngestService;
use crate::services::query::QueryService;
use crate::services::retrieval::RetrievalService;

pub struct CivicDeskFactory;

impl CivicDeskFactory {
    pub async fn create_from_config(config: Config) -> Result<CivicDesk> {
        let config = config.resolve_env();

        let store: Arc<dyn DocumentStore> =
            Arc::new(SqliteDocumentStore::new(&config.sqlite_path()).await?);

        let provider_name = config.provider.as_deref().unwrap_or("openai").to_string();
        let generator: Arc<dyn LlmProvider> = match provider_name.as_str() {
            "openai" => Arc::new(build_openai(config.openai.as_ref())?),
            "deepseek" => Arc::new(build_deepseek(config.deepseek.as_ref())?),
            other => {
                return Err(CivicDeskError::Config(format!(
                    "unknown provider '{other}' (expected 'openai' or 'deepseek')"
                )))
            }
        };

        // Embeddings always go through the OpenAI-compatible embeddings
        // endpoint; DeepSeek does not serve one, so the OpenAI section is
        // used when present even when DeepSeek answers questions.
        let embedder: Arc<dyn LlmProvider> = if config.openai.is_some() {
            if provider_name == "openai" {
                Arc::clone(&generator)
            } else {
                Arc::new(build_openai(config.openai.as_ref())?)
            }
        } else {
            Arc::clone(&generator)
        };

        let embedding_model = config
            .openai
            .as_ref()
            .and_then(|p| p.embedding_model.clone());

        let retrieval = Arc::new(RetrievalService::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            embedding_model.clone(),
            config.retrieval.as_ref().and_then(|r| r.min_score),
        ));

        let ingest = IngestService::new(
            Arc::clone(&store),
            embedder,
            embedding_model,
            config.ingest.as_ref().and_then(|i| i.max_chunk_chars),
            config.ingest.as_ref().and_then(|i| i.chunk_overlap_chars),
        );

        let query = QueryService::new(
            Arc::clone(&store),
            generator,
            Arc::clone(&retrieval),
            config.retrieval.as_ref().and_then(|r| r.top_k),
            config.retrieval.as_ref().and_then(|r| r.history_limit),
        );

        Ok(CivicDesk::new(store, ingest, retrieval, query))
    }
}

fn build_openai(section: Option<&ProviderConfig>) -> Result<OpenAiProvider> {
    let section = section
        .ok_or_else(|| CivicDeskError::Config("missing openai configuration".to_string()))?;
    let api_key = resolve_api_key(section, "OpenAI")?;
    Ok(OpenAiProvider::new(
        api_key,
        section.model.clone(),
        section.embedding_model.clone(),
        section.base_url.clone(),
    ))
}

fn build_deepseek(section: Option<&ProviderConfig>) -> Result<OpenAiProvider> {
    let section = section
        .ok_or_else(|| CivicDeskError::Config("missing deepseek configuration".to_string()))?;
    let api_key = resolve_api_key(section, "DeepSeek")?;
    Ok(OpenAiProvider::new(
        api_key,
        section
            .model
            .clone()
            .or_else(|| Some("deepseek-chat".to_string())),
        section.embedding_model.clone(),
        section
            .base_url
            .clone()
            .or_else(|| Some(DEEPSEEK_BASE_URL.to_string())),
    ))
}

fn resolve_api_key(section: &ProviderConfig, name: &str) -> Result<String> {
    section
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            // A custom base URL means a local OpenAI-compatible server that
            // ignores the key.
            section.base_url.is_some().then(|| "local".to_string())
        })
        .ok_or_else(|| CivicDeskError::Config(format!("Missing {name} API key")))
}
