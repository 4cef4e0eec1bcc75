use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

use crate::domains::chat::ChatMessage;
use crate::domains::document::{Document, ScoredChunk};
use crate::error::{CivicDeskError, Result};
use crate::interfaces::providers::{DocumentStore, LlmProvider};
use crate::services::analysis::prompt_digest;
use crate::services::retrieval::{RetrievalService, DEFAULT_TOP_K};

pub const DEFAULT_HISTORY_LIMIT: usize = 12;
const RETRY_HISTORY_LIMIT: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
}

/// Retrieval-augmented answering over one document, with chat persistence.
pub struct QueryService {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn LlmProvider>,
    retrieval: Arc<RetrievalService>,
    top_k: usize,
    history_limit: usize,
}

impl QueryService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn LlmProvider>,
        retrieval: Arc<RetrievalService>,
        top_k: Option<usize>,
        history_limit: Option<usize>,
    ) -> Self {
        Self {
            store,
            generator,
            retrieval,
            top_k: top_k.unwrap_or(DEFAULT_TOP_K),
            history_limit: history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        }
    }

    /// Answer a question inside a chat and persist both sides of the turn.
    pub async fn answer_in_chat(&self, chat_id: i32, question: &str) -> Result<ChatMessage> {
        let chat = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound(format!("chat {chat_id}")))?;
        let document = self
            .store
            .get_document(chat.document_id)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound(format!("document {}", chat.document_id)))?;

        let history = self
            .store
            .list_messages(chat_id, self.history_limit)
            .await?;
        let history_lines: Vec<String> = history
            .iter()
            .map(|m| {
                format!(
                    "[{}] {}: {}",
                    format_timestamp(m.created_at),
                    m.role,
                    m.content
                )
            })
            .collect();

        let answer = self
            .generate(&document, Some(chat.document_id), question, &history_lines)
            .await?;

        self.store.append_message(chat_id, "user", question).await?;
        let assistant = self
            .store
            .append_message(chat_id, "assistant", &answer.answer)
            .await?;
        Ok(assistant)
    }

    /// One-shot answer for a document, nothing persisted.
    pub async fn ask(&self, document_id: i32, question: &str) -> Result<RagAnswer> {
        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound(format!("document {document_id}")))?;
        self.generate(&document, Some(document_id), question, &[])
            .await
    }

    async fn generate(
        &self,
        document: &Document,
        scope: Option<i32>,
        question: &str,
        history: &[String],
    ) -> Result<RagAnswer> {
        let sources = self.retrieval.search(question, scope, self.top_k).await?;
        let system_prompt = build_system_prompt(&document.title);
        let prompt = build_prompt(question, &sources, history, false);

        match self.generator.generate_text(&prompt, &system_prompt).await {
            Ok(answer) => Ok(RagAnswer { answer, sources }),
            Err(err) if is_token_limit_error(&err) => {
                // Single retry with a shortened prompt: half the chunks,
                // truncated history.
                tracing::warn!(error = %err, "token limit hit, retrying with shortened prompt");
                let keep = (sources.len() / 2).max(1).min(sources.len());
                let shortened: Vec<ScoredChunk> = sources.iter().take(keep).cloned().collect();
                let tail_start = history.len().saturating_sub(RETRY_HISTORY_LIMIT);
                let prompt = build_prompt(question, &shortened, &history[tail_start..], true);
                let answer = self.generator.generate_text(&prompt, &system_prompt).await?;
                Ok(RagAnswer {
                    answer,
                    sources: shortened,
                })
            }
            Err(err) => Err(err),
        }
    }
}

const TIMESTAMP_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

fn format_timestamp(ts: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|dt| dt.format(TIMESTAMP_FORMAT).ok())
        .unwrap_or_else(|| ts.to_string())
}

fn build_system_prompt(document_title: &str) -> String {
    format!(
        "You are an assistant answering questions about the political or administrative document \"{document_title}\". \
Base your answers on the supplied document excerpts and extracted figures. \
Say so plainly when the excerpts do not contain the answer."
    )
}

fn build_prompt(
    question: &str,
    sources: &[ScoredChunk],
    history: &[String],
    shortened: bool,
) -> String {
    let mut prompt = String::new();

    if shortened {
        prompt.push_str("NOTE: the context was shortened to fit the model's limit.\n\n");
    }

    if !sources.is_empty() {
        prompt.push_str("DOCUMENT EXCERPTS:\n");
        for (i, chunk) in sources.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n\n", i + 1, chunk.content));
        }
    }

    let combined: String = sources
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let digest = prompt_digest(&combined);
    if !digest.is_empty() {
        prompt.push_str("EXTRACTED FIGURES:\n");
        prompt.push_str(&digest);
        prompt.push_str("\n\n");
    }

    if !history.is_empty() {
        prompt.push_str("CONVERSATION HISTORY:\n");
        prompt.push_str(&history.join("\n"));
        prompt.push_str("\n\n");
    }

    prompt.push_str("QUESTION:\n");
    prompt.push_str(question);
    prompt
}

fn is_token_limit_error(err: &CivicDeskError) -> bool {
    match err {
        CivicDeskError::Http(message) => {
            let folded = message.to_lowercase();
            folded.contains("context_length_exceeded")
                || folded.contains("maximum context length")
        }
        _ => false,
    }
}
