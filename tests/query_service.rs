mod common;

use httpmock::Method::POST;
use httpmock::MockServer;
use tempfile::NamedTempFile;

use civicdesk::client::CivicDesk;
use civicdesk::error::CivicDeskError;
use civicdesk::services::ingest::UploadInput;

use common::{chat_body, embedding_body, make_config, token_limit_body};

async fn make_desk(server: &MockServer, db: &NamedTempFile) -> CivicDesk {
    let config = make_config(&server.base_url(), db.path().to_str().unwrap());
    CivicDesk::from_config(config).await.unwrap()
}

async fn upload_three_chunk_document(desk: &CivicDesk) -> i32 {
    // With a 60-char chunk budget this yields three chunks: the title, the
    // bins paragraph and the council-tax paragraph.
    let document = desk
        .upload_document(UploadInput {
            title: "Budget briefing".to_string(),
            content: "Bins are collected weekly on Monday mornings.\n\nCouncil tax rises by five percent in April.".to_string(),
            folder: None,
            source_name: None,
        })
        .await
        .unwrap();
    document.id
}

#[tokio::test]
async fn ask_returns_answer_with_sources() {
    let server = MockServer::start_async().await;
    let embed_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(embedding_body(&[0.5, 0.5]));
        })
        .await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .json_body(chat_body("Council tax rises by 5%."));
        })
        .await;

    let db = NamedTempFile::new().unwrap();
    let desk = make_desk(&server, &db).await;
    let document_id = upload_three_chunk_document(&desk).await;

    let answer = desk
        .ask(document_id, "How much does council tax rise?")
        .await
        .unwrap();
    assert_eq!(answer.answer, "Council tax rises by 5%.");
    assert_eq!(answer.sources.len(), 3);
    chat_mock.assert_hits(1);
    assert!(embed_mock.hits_async().await >= 4);
}

#[tokio::test]
async fn token_limit_triggers_one_shortened_retry() {
    let server = MockServer::start_async().await;
    let _embed_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(embedding_body(&[0.5, 0.5]));
        })
        .await;
    // The full prompt carries all three excerpts, so "[3]" only appears on
    // the first attempt; the retry prompt announces the shortening.
    let overflow_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("[3]");
            then.status(400).json_body(token_limit_body());
        })
        .await;
    let retry_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("context was shortened");
            then.status(200).json_body(chat_body("short answer"));
        })
        .await;

    let db = NamedTempFile::new().unwrap();
    let desk = make_desk(&server, &db).await;
    let document_id = upload_three_chunk_document(&desk).await;

    let chat = desk.create_chat(document_id, "Tax questions").await.unwrap();
    let assistant = desk
        .post_message(chat.id, "How much does council tax rise?")
        .await
        .unwrap();
    assert_eq!(assistant.role, "assistant");
    assert_eq!(assistant.content, "short answer");
    overflow_mock.assert_hits(1);
    retry_mock.assert_hits(1);

    // Both sides of the turn were persisted.
    let messages = desk.chat_messages(chat.id, 0).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[1].role, "assistant");
}

#[tokio::test]
async fn non_token_limit_errors_are_not_retried() {
    let server = MockServer::start_async().await;
    let _embed_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(embedding_body(&[0.5, 0.5]));
        })
        .await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(400).json_body(serde_json::json!({
                "error": {
                    "message": "invalid request",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": null
                }
            }));
        })
        .await;

    let db = NamedTempFile::new().unwrap();
    let desk = make_desk(&server, &db).await;
    let document_id = upload_three_chunk_document(&desk).await;

    let err = desk
        .ask(document_id, "How much does council tax rise?")
        .await
        .unwrap_err();
    assert!(matches!(err, CivicDeskError::Http(_)));
    chat_mock.assert_hits(1);
}

#[tokio::test]
async fn asking_about_a_missing_document_is_not_found() {
    let server = MockServer::start_async().await;
    let db = NamedTempFile::new().unwrap();
    let desk = make_desk(&server, &db).await;

    let err = desk.ask(41, "anything").await.unwrap_err();
    assert!(matches!(err, CivicDeskError::NotFound(_)));

    let err = desk.post_message(41, "anything").await.unwrap_err();
    assert!(matches!(err, CivicDeskError::NotFound(_)));
}
