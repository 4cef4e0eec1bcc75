use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CivicDeskError, Result};

pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEEPSEEK_KEY_ENV: &str = "DEEPSEEK_API_KEY";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    pub max_chunk_chars: Option<usize>,
    pub chunk_overlap_chars: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Which text-generation provider answers questions: "openai" or "deepseek".
    pub provider: Option<String>,
    pub openai: Option<ProviderConfig>,
    pub deepseek: Option<ProviderConfig>,
    pub storage: Option<StorageConfig>,
    pub ingest: Option<IngestConfig>,
    pub retrieval: Option<RetrievalConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| CivicDeskError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| CivicDeskError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Fill missing API keys from the environment. OPENAI_API_KEY and
    /// DEEPSEEK_API_KEY select the keys for the two providers.
    pub fn resolve_env(mut self) -> Self {
        if let Some(openai) = &mut self.openai {
            if openai.api_key.is_none() {
                openai.api_key = env_key(OPENAI_KEY_ENV);
            }
        } else if let Some(key) = env_key(OPENAI_KEY_ENV) {
            self.openai = Some(ProviderConfig {
                api_key: Some(key),
                model: None,
                embedding_model: None,
                base_url: None,
            });
        }
        if let Some(deepseek) = &mut self.deepseek {
            if deepseek.api_key.is_none() {
                deepseek.api_key = env_key(DEEPSEEK_KEY_ENV);
            }
        } else if let Some(key) = env_key(DEEPSEEK_KEY_ENV) {
            self.deepseek = Some(ProviderConfig {
                api_key: Some(key),
                model: None,
                embedding_model: None,
                base_url: None,
            });
        }
        self
    }

    pub fn sqlite_path(&self) -> String {
        self.storage
            .as_ref()
            .and_then(|s| s.sqlite_path.clone())
            .unwrap_or_else(|| "./data/civicdesk.db".to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Some("openai".to_string()),
            openai: None,
            deepseek: None,
            storage: None,
            ingest: None,
            retrieval: None,
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
