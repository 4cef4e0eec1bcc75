use async_trait::async_trait;
use serde_json::Value;

use async_openai::{
    config::OpenAIConfig,
    types::{
        chat::{
            ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
            ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
            CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
        },
        embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput},
    },
    Client,
};

use crate::error::{CivicDeskError, Result};
use crate::interfaces::providers::LlmProvider;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Provider for any OpenAI-compatible chat/embeddings API. DeepSeek is
/// reached through the same client with its base URL swapped in.
#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    embedding_model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        embedding_model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        let model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
        let embedding_model =
            embedding_model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let base_url = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            model,
            embedding_model,
            client: Client::with_config(config),
        }
    }

    fn build_system_message(system_prompt: &str) -> Result<Option<ChatCompletionRequestMessage>> {
        if system_prompt.is_empty() {
            return Ok(None);
        }
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(Some(ChatCompletionRequestMessage::System(message)))
    }

    fn build_user_message(prompt: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::User(message))
    }

    fn extract_text_from_response(
        response: &async_openai::types::chat::CreateChatCompletionResponse,
    ) -> Result<String> {
        let message = response
            .choices
            .first()
            .ok_or_else(|| CivicDeskError::Runtime("No choices returned".to_string()))?
            .message
            .content
            .clone()
            .unwrap_or_default();
        Ok(message)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = Self::build_system_message(system_prompt)? {
            messages.push(system);
        }
        messages.push(Self::build_user_message(prompt)?);

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .build()
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CivicDeskError::Http(e.to_string()))?;

        Self::extract_text_from_response(&response)
    }

    async fn parse_structured_output(
        &self,
        prompt: &str,
        system_prompt: &str,
        json_schema: Value,
    ) -> Result<Value> {
        let mut messages = Vec::new();
        if let Some(system) = Self::build_system_message(system_prompt)? {
            messages.push(system);
        }
        messages.push(Self::build_user_message(prompt)?);

        let name = json_schema
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("structured_output")
            .to_string();
        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                name,
                description: None,
                schema: Some(json_schema),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .response_format(response_format)
            .build()
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CivicDeskError::Http(e.to_string()))?;

        let content = Self::extract_text_from_response(&response)?;
        let parsed = serde_json::from_str(&content)
            .map_err(|e| CivicDeskError::Serialization(e.to_string()))?;
        Ok(parsed)
    }

    async fn embed(&self, inputs: Vec<String>, model: Option<&str>) -> Result<Vec<Vec<f32>>> {
        let model_name = model
            .map(|value| value.to_string())
            .unwrap_or_else(|| self.embedding_model.clone());
        // One request per input; the upstream callers deliberately do not batch.
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let request = CreateEmbeddingRequestArgs::default()
                .model(model_name.clone())
                .input(EmbeddingInput::String(input))
                .build()
                .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| CivicDeskError::Http(e.to_string()))?;
            let data = response
                .data
                .into_iter()
                .next()
                .ok_or_else(|| CivicDeskError::Runtime("No embedding data".to_string()))?;
            outputs.push(data.embedding);
        }
        Ok(outputs)
    }
}
