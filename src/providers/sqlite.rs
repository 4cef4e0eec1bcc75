use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::BufMut;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde_json::Value;

use crate::domains::chat::{Chat, ChatMessage};
use crate::domains::document::{ChunkRecord, Document};
use crate::error::{CivicDeskError, Result};
use crate::interfaces::providers::{DocumentStore, NewChunk};

mod schema;
use schema::{chats, chunks, documents, messages};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct DocumentRow {
    id: i32,
    title: String,
    content: String,
    markdown: Option<String>,
    metadata: Option<String>,
    folder: Option<String>,
    created_at: i64,
    updated_at: i64,
}

#[derive(Queryable)]
struct ChatRow {
    id: i32,
    document_id: i32,
    title: String,
    created_at: i64,
}

#[derive(Queryable)]
struct MessageRow {
    id: i32,
    chat_id: i32,
    role: String,
    content: String,
    created_at: i64,
}

#[derive(Queryable)]
struct ChunkRow {
    id: i32,
    document_id: i32,
    chunk_index: i32,
    content: String,
    embedding: Option<Vec<u8>>,
    metadata: Option<String>,
}

#[derive(QueryableByName)]
struct RowId {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    id: i64,
}

#[derive(Insertable)]
#[diesel(table_name = documents)]
struct NewDocumentRow<'a> {
    title: &'a str,
    content: &'a str,
    markdown: Option<&'a str>,
    metadata: Option<&'a str>,
    folder: Option<&'a str>,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = chats)]
struct NewChatRow<'a> {
    document_id: i32,
    title: &'a str,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessageRow<'a> {
    chat_id: i32,
    role: &'a str,
    content: &'a str,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = chunks)]
struct NewChunkRow<'a> {
    document_id: i32,
    chunk_index: i32,
    content: &'a str,
    embedding: Option<&'a [u8]>,
    metadata: Option<&'a str>,
}

impl DocumentRow {
    fn into_domain(self) -> Document {
        Document {
            id: self.id,
            title: self.title,
            content: self.content,
            markdown: self.markdown,
            metadata: parse_metadata(self.metadata),
            folder: self.folder,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ChatRow {
    fn into_domain(self) -> Chat {
        Chat {
            id: self.id,
            document_id: self.document_id,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

impl MessageRow {
    fn into_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            chat_id: self.chat_id,
            role: self.role,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

impl ChunkRow {
    fn into_domain(self) -> ChunkRecord {
        ChunkRecord {
            id: self.id,
            document_id: self.document_id,
            chunk_index: self.chunk_index,
            content: self.content,
            embedding: self.embedding.as_deref().and_then(blob_to_embedding),
            metadata: parse_metadata(self.metadata),
        }
    }
}

fn parse_metadata(raw: Option<String>) -> Option<Value> {
    raw.and_then(|text| serde_json::from_str(&text).ok())
}

/// Embedding vectors are stored as little-endian f32 byte strings.
pub fn embedding_to_blob(values: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(values.len() * 4);
    for value in values {
        blob.put_f32_le(*value);
    }
    blob
}

/// A blob of the wrong shape decodes to None and the chunk counts as
/// un-embedded.
pub fn blob_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.is_empty() || blob.len() % 4 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Some(out)
}

fn now_ts() -> Result<i64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| CivicDeskError::Runtime(e.to_string()))?
        .as_secs() as i64)
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok::<_, CivicDeskError>(())
    })
    .await
    .map_err(|e| CivicDeskError::Runtime(e.to_string()))??;
    Ok(())
}

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn new(sqlite_path: &str) -> Result<Self> {
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))
    }

    async fn last_insert_id(conn: &mut SqlitePooledConn<'_>) -> Result<i32> {
        let row: RowId = diesel::sql_query("SELECT last_insert_rowid() as id")
            .get_result(conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(row.id as i32)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert_document(
        &self,
        title: &str,
        content: &str,
        markdown: Option<&str>,
        metadata: Option<&Value>,
        folder: Option<&str>,
    ) -> Result<Document> {
        let ts = now_ts()?;
        let metadata_text = match metadata {
            Some(value) => Some(
                serde_json::to_string(value)
                    .map_err(|e| CivicDeskError::Serialization(e.to_string()))?,
            ),
            None => None,
        };
        let new_row = NewDocumentRow {
            title,
            content,
            markdown,
            metadata: metadata_text.as_deref(),
            folder,
            created_at: ts,
            updated_at: ts,
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(documents::table)
            .values(&new_row)
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        let id = Self::last_insert_id(&mut conn).await?;

        let row: DocumentRow = documents::table
            .find(id)
            .first(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(row.into_domain())
    }

    async fn get_document(&self, id: i32) -> Result<Option<Document>> {
        let mut conn = self.conn().await?;
        let row: Option<DocumentRow> = documents::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(row.map(DocumentRow::into_domain))
    }

    async fn list_documents(&self, folder: Option<&str>) -> Result<Vec<Document>> {
        let mut conn = self.conn().await?;
        let mut query = documents::table
            .order(documents::created_at.desc())
            .into_boxed();
        if let Some(folder) = folder {
            query = query.filter(documents::folder.eq(folder));
        }
        let rows: Vec<DocumentRow> = query
            .load(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(DocumentRow::into_domain).collect())
    }

    async fn delete_document(&self, id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;
        let chat_ids: Vec<i32> = chats::table
            .filter(chats::document_id.eq(id))
            .select(chats::id)
            .load(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        diesel::delete(messages::table.filter(messages::chat_id.eq_any(&chat_ids)))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        diesel::delete(chats::table.filter(chats::document_id.eq(id)))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        diesel::delete(chunks::table.filter(chunks::document_id.eq(id)))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        let deleted = diesel::delete(documents::table.find(id))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(deleted > 0)
    }

    async fn move_document(&self, id: i32, folder: Option<&str>) -> Result<Option<Document>> {
        let ts = now_ts()?;
        let mut conn = self.conn().await?;
        let updated = diesel::update(documents::table.find(id))
            .set((
                documents::folder.eq(folder),
                documents::updated_at.eq(ts),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        if updated == 0 {
            return Ok(None);
        }
        let row: DocumentRow = documents::table
            .find(id)
            .first(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(Some(row.into_domain()))
    }

    async fn insert_chunks(&self, document_id: i32, chunks_in: Vec<NewChunk>) -> Result<()> {
        let mut conn = self.conn().await?;
        for chunk in &chunks_in {
            let blob = chunk.embedding.as_deref().map(embedding_to_blob);
            let metadata_text = match &chunk.metadata {
                Some(value) => Some(
                    serde_json::to_string(value)
                        .map_err(|e| CivicDeskError::Serialization(e.to_string()))?,
                ),
                None => None,
            };
            let new_row = NewChunkRow {
                document_id,
                chunk_index: chunk.chunk_index,
                content: &chunk.content,
                embedding: blob.as_deref(),
                metadata: metadata_text.as_deref(),
            };
            diesel::insert_into(chunks::table)
                .values(&new_row)
                .execute(&mut conn)
                .await
                .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        }
        Ok(())
    }

    async fn chunks_for_document(&self, document_id: i32) -> Result<Vec<ChunkRecord>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ChunkRow> = chunks::table
            .filter(chunks::document_id.eq(document_id))
            .order(chunks::chunk_index.asc())
            .load(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(ChunkRow::into_domain).collect())
    }

    async fn all_chunks(&self) -> Result<Vec<ChunkRecord>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ChunkRow> = chunks::table
            .order((chunks::document_id.asc(), chunks::chunk_index.asc()))
            .load(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(ChunkRow::into_domain).collect())
    }

    async fn set_chunk_embedding(&self, chunk_id: i32, embedding: &[f32]) -> Result<()> {
        let blob = embedding_to_blob(embedding);
        let mut conn = self.conn().await?;
        diesel::update(chunks::table.find(chunk_id))
            .set(chunks::embedding.eq(Some(blob)))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(())
    }

    async fn create_chat(&self, document_id: i32, title: &str) -> Result<Chat> {
        let ts = now_ts()?;
        let new_row = NewChatRow {
            document_id,
            title,
            created_at: ts,
        };
        let mut conn = self.conn().await?;
        diesel::insert_into(chats::table)
            .values(&new_row)
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        let id = Self::last_insert_id(&mut conn).await?;
        let row: ChatRow = chats::table
            .find(id)
            .first(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(row.into_domain())
    }

    async fn get_chat(&self, id: i32) -> Result<Option<Chat>> {
        let mut conn = self.conn().await?;
        let row: Option<ChatRow> = chats::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(row.map(ChatRow::into_domain))
    }

    async fn list_chats(&self, document_id: i32) -> Result<Vec<Chat>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ChatRow> = chats::table
            .filter(chats::document_id.eq(document_id))
            .order(chats::created_at.desc())
            .load(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(ChatRow::into_domain).collect())
    }

    async fn delete_chat(&self, id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;
        diesel::delete(messages::table.filter(messages::chat_id.eq(id)))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        let deleted = diesel::delete(chats::table.find(id))
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(deleted > 0)
    }

    async fn append_message(
        &self,
        chat_id: i32,
        role: &str,
        content: &str,
    ) -> Result<ChatMessage> {
        let ts = now_ts()?;
        let new_row = NewMessageRow {
            chat_id,
            role,
            content,
            created_at: ts,
        };
        let mut conn = self.conn().await?;
        diesel::insert_into(messages::table)
            .values(&new_row)
            .execute(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        let id = Self::last_insert_id(&mut conn).await?;
        let row: MessageRow = messages::table
            .find(id)
            .first(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        Ok(row.into_domain())
    }

    async fn list_messages(&self, chat_id: i32, limit: usize) -> Result<Vec<ChatMessage>> {
        let mut conn = self.conn().await?;
        let mut query = messages::table
            .filter(messages::chat_id.eq(chat_id))
            .order(messages::id.desc())
            .into_boxed();
        if limit > 0 {
            query = query.limit(limit as i64);
        }
        let mut rows: Vec<MessageRow> = query
            .load(&mut conn)
            .await
            .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
        rows.sort_by_key(|row| row.id);
        Ok(rows.into_iter().map(MessageRow::into_domain).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip() {
        let values = vec![0.25f32, -1.5, 3.0];
        let blob = embedding_to_blob(&values);
        assert_eq!(blob.len(), 12);
        assert_eq!(blob_to_embedding(&blob), Some(values));
    }

    #[test]
    fn malformed_blob_is_none() {
        assert_eq!(blob_to_embedding(&[]), None);
        assert_eq!(blob_to_embedding(&[1, 2, 3]), None);
    }
}
