//! End-to-end post creation against a scripted transport and an
//! in-memory store.

use std::sync::Arc;

use quillforge_common::config::GenerationConfig;
use quillforge_common::generation::{GenerationClient, GenerationError, ScriptedTransport, TransportError};
use quillforge_common::posts::{MemoryPostStore, PostService};
use quillforge_common::AppError;
use uuid::Uuid;

const CATS_REPLY: &str = "```json\n{\"title\":\"Cats\",\"body\":\"Cats are great.\",\"seo_keywords\":\"cats, pets\"}\n```";

struct Harness {
    service: PostService,
    store: Arc<MemoryPostStore>,
    transport: Arc<ScriptedTransport>,
}

fn harness(api_key: Option<&str>, transport: ScriptedTransport) -> Harness {
    let transport = Arc::new(transport);
    let config = GenerationConfig {
        api_key: api_key.map(String::from),
        ..GenerationConfig::default()
    };
    let client = Arc::new(GenerationClient::new(&config, transport.clone()));
    let store = Arc::new(MemoryPostStore::new());

    Harness {
        service: PostService::new(client, store.clone()),
        store,
        transport,
    }
}

fn generation_error(err: AppError) -> GenerationError {
    match err {
        AppError::Generation(inner) => inner,
        other => panic!("expected a generation failure, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_credential_is_configuration_error_without_rows() {
    let h = harness(None, ScriptedTransport::new().with_reply(CATS_REPLY));

    let err = h
        .service
        .create_generated_post("write about cats", Uuid::now_v7())
        .await
        .unwrap_err();

    assert!(matches!(
        generation_error(err),
        GenerationError::Configuration { .. }
    ));
    assert!(h.store.is_empty());
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn rate_limited_transport_is_quota_exceeded_without_rows() {
    let h = harness(
        Some("quota-test-key"),
        ScriptedTransport::new().with_failure(TransportError::Request(
            "429 Resource has been exhausted (e.g. check quota).".to_string(),
        )),
    );

    let err = h
        .service
        .create_generated_post("write about cats", Uuid::now_v7())
        .await
        .unwrap_err();

    assert!(matches!(
        generation_error(err),
        GenerationError::QuotaExceeded { .. }
    ));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unrelated_transport_error_is_transport_error_without_rows() {
    let h = harness(
        Some("transport-test-key"),
        ScriptedTransport::new().with_failure(TransportError::Request(
            "dns error: failed to lookup address information".to_string(),
        )),
    );

    let err = h
        .service
        .create_generated_post("write about cats", Uuid::now_v7())
        .await
        .unwrap_err();

    assert!(matches!(
        generation_error(err),
        GenerationError::Transport { .. }
    ));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn cats_prompt_produces_stored_post() {
    let h = harness(
        Some("cats-test-key"),
        ScriptedTransport::new().with_reply(CATS_REPLY),
    );
    let author = Uuid::now_v7();

    let post = h
        .service
        .create_generated_post("write about cats", author)
        .await
        .unwrap();

    assert_eq!(post.title, "Cats");
    assert_eq!(post.body, "Cats are great.");
    assert_eq!(post.seo_keywords, "cats, pets");
    assert_eq!(post.author_id, author);
    assert!(!post.id.is_nil());

    let stored = h.service.get_post(post.id).await.unwrap();
    assert_eq!(stored, post);

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].api_key, "cats-test-key");
    assert!(calls[0].prompt.ends_with("write about cats"));
}

#[tokio::test]
async fn posts_list_newest_first() {
    let reply = |title: &str| format!(r#"{{"title":"{}","body":"Body of {}."}}"#, title, title);
    let h = harness(
        Some("listing-test-key"),
        ScriptedTransport::new()
            .with_reply(reply("First"))
            .with_reply(reply("Second"))
            .with_reply(reply("Third")),
    );
    let author = Uuid::now_v7();

    let mut ids = Vec::new();
    for prompt in ["one", "two", "three"] {
        let post = h.service.create_generated_post(prompt, author).await.unwrap();
        ids.push(post.id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let listed = h.service.list_posts(0, 100).await.unwrap();
    let titles: Vec<&str> = listed.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Third", "Second", "First"]);

    ids.reverse();
    let listed_ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
    assert_eq!(listed_ids, ids);
}
