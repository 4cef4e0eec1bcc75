mod common;

use std::sync::Arc;

use httpmock::Method::POST;
use httpmock::MockServer;
use tempfile::NamedTempFile;

use civicdesk::client::CivicDesk;
use civicdesk::interfaces::providers::{DocumentStore, NewChunk};
use civicdesk::providers::openai::OpenAiProvider;
use civicdesk::providers::sqlite::SqliteDocumentStore;
use civicdesk::services::ingest::UploadInput;
use civicdesk::services::retrieval::RetrievalService;

use common::{embedding_body, make_config};

#[tokio::test]
async fn search_ranks_chunks_by_cosine_similarity() {
    let server = MockServer::start_async().await;
    let title_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .body_contains("Waste and tax report");
            then.status(200)
                .json_body(embedding_body(&[0.0, 0.0, 1.0]));
        })
        .await;
    let bins_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .body_contains("collected weekly");
            then.status(200)
                .json_body(embedding_body(&[1.0, 0.0, 0.0]));
        })
        .await;
    let tax_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .body_contains("rises by five percent");
            then.status(200)
                .json_body(embedding_body(&[0.0, 1.0, 0.0]));
        })
        .await;
    let query_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .body_contains("how much does tax rise");
            then.status(200)
                .json_body(embedding_body(&[0.0, 0.9, 0.1]));
        })
        .await;

    let db = NamedTempFile::new().unwrap();
    let config = make_config(&server.base_url(), db.path().to_str().unwrap());
    let desk = CivicDesk::from_config(config).await.unwrap();

    let document = desk
        .upload_document(UploadInput {
            title: "Waste and tax report".to_string(),
            content: "Bins are collected weekly on Monday mornings.\n\nCouncil tax rises by five percent in April.".to_string(),
            folder: None,
            source_name: None,
        })
        .await
        .unwrap();

    let results = desk
        .search("how much does tax rise", Some(document.id), 2)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].content.contains("rises by five percent"));
    assert!(results[0].score > results[1].score);

    // Same query again: the chunk map and the query-embedding cache are
    // both warm, so no further provider calls happen.
    let again = desk
        .search("how much does tax rise", Some(document.id), 2)
        .await
        .unwrap();
    assert_eq!(again.len(), 2);

    title_mock.assert_hits(1);
    bins_mock.assert_hits(1);
    tax_mock.assert_hits(1);
    query_mock.assert_hits(1);
}

#[tokio::test]
async fn scan_embeds_missing_chunks_and_writes_back() {
    let server = MockServer::start_async().await;
    let first_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .body_contains("potholes on the high street");
            then.status(200)
                .json_body(embedding_body(&[1.0, 0.0]));
        })
        .await;
    let second_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .body_contains("library opening hours");
            then.status(200)
                .json_body(embedding_body(&[0.0, 1.0]));
        })
        .await;
    let query_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .body_contains("when is the library open");
            then.status(200)
                .json_body(embedding_body(&[0.1, 0.9]));
        })
        .await;

    let db = NamedTempFile::new().unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::new(db.path().to_str().unwrap())
            .await
            .unwrap(),
    );
    let provider = Arc::new(OpenAiProvider::new(
        "key".to_string(),
        None,
        None,
        Some(server.base_url()),
    ));
    let retrieval = RetrievalService::new(Arc::clone(&store), provider, None, None);

    let document = store
        .insert_document("Minutes", "content", None, None, None)
        .await
        .unwrap();
    store
        .insert_chunks(
            document.id,
            vec![
                NewChunk {
                    chunk_index: 0,
                    content: "potholes on the high street".to_string(),
                    embedding: None,
                    metadata: None,
                },
                NewChunk {
                    chunk_index: 1,
                    content: "library opening hours".to_string(),
                    embedding: None,
                    metadata: None,
                },
            ],
        )
        .await
        .unwrap();

    let results = retrieval
        .search("when is the library open", Some(document.id), 5)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].content.contains("library"));

    // Vectors were written back to the store during the scan.
    let chunks = store.chunks_for_document(document.id).await.unwrap();
    assert!(chunks.iter().all(|c| c.embedding.is_some()));

    // A fresh scan reuses the stored vectors.
    let _ = retrieval
        .search("when is the library open", Some(document.id), 5)
        .await
        .unwrap();
    first_mock.assert_hits(1);
    second_mock.assert_hits(1);
    query_mock.assert_hits(1);
}
