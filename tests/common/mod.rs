#![allow(dead_code)]

use serde_json::{json, Value};

use civicdesk::config::{Config, IngestConfig, ProviderConfig, StorageConfig};

pub fn make_config(base_url: &str, db_path: &str) -> Config {
    Config {
        provider: Some("openai".to_string()),
        openai: Some(ProviderConfig {
            api_key: Some("key".to_string()),
            model: Some("gpt-4o-mini".to_string()),
            embedding_model: None,
            base_url: Some(base_url.to_string()),
        }),
        deepseek: None,
        storage: Some(StorageConfig {
            sqlite_path: Some(db_path.to_string()),
        }),
        ingest: Some(IngestConfig {
            max_chunk_chars: Some(60),
            chunk_overlap_chars: Some(0),
        }),
        retrieval: None,
    }
}

pub fn embedding_body(vector: &[f32]) -> Value {
    json!({
        "object": "list",
        "data": [{"object": "embedding", "index": 0, "embedding": vector}],
        "model": "text-embedding-3-small",
        "usage": {"prompt_tokens": 1, "total_tokens": 1}
    })
}

pub fn chat_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

pub fn token_limit_body() -> Value {
    json!({
        "error": {
            "message": "This model's maximum context length is 8192 tokens.",
            "type": "invalid_request_error",
            "param": null,
            "code": "context_length_exceeded"
        }
    })
}
