// SdkResolver against a mocked JSON-RPC endpoint

mod common;

use common::{StaticResolver, claim_for, payload, publish};
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;
use spool_core::BlobHash;
use spool_player::{PlayerError, ResolveCache, Resolver, SdkResolver};
use spool_storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

#[tokio::test]
async fn test_sdk_resolve() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let sd_hash = BlobHash::compute(b"manifest").to_hex();
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .json_body_partial(r#"{"method":"resolve","params":{"urls":["what#6769"]}}"#);
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "what#6769": {
                        "canonical_url": "lbry://what#6769",
                        "claim_id": "6769",
                        "name": "what",
                        "timestamp": 1530000000,
                        "value": {
                            "source": {
                                "sd_hash": sd_hash,
                                "media_type": "video/mp4",
                                "size": "1024"
                            }
                        }
                    }
                }
            }));
        })
        .await;

    let resolver = SdkResolver::new(&server.url("/"), Duration::from_secs(5)).unwrap();
    let claims = resolver.resolve("what#6769").await.unwrap();
    let claim = &claims["what#6769"];
    assert_eq!(claim.name, "what");
    assert_eq!(claim.value.source.as_ref().unwrap().size, Some(1024));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_sdk_error_response() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32500, "message": "wallet is locked" }
            }));
        })
        .await;

    let resolver = SdkResolver::new(&server.url("/"), Duration::from_secs(5)).unwrap();
    match resolver.resolve("what#6769").await {
        Err(PlayerError::Resolver(msg)) => assert!(msg.contains("wallet is locked")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_sdk_unresolvable_claim_is_not_found() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "gone#1": { "error": { "name": "NOT_FOUND", "text": "no claim" } }
                }
            }));
        })
        .await;

    let resolver = Arc::new(SdkResolver::new(&server.url("/"), Duration::from_secs(5)).unwrap());
    let cache = ResolveCache::new(resolver, Duration::from_secs(60), Duration::from_secs(60), 10);
    assert!(matches!(
        cache.resolve("gone#1").await,
        Err(PlayerError::StreamNotFound)
    ));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_resolve_cache_over_static_resolver() {
    let store = MemoryStore::new();
    let packed = publish(&store, &payload(10), 64).await;
    let resolver = Arc::new(StaticResolver::default());
    resolver.insert("clip#abc", claim_for(&packed, "clip", "abc", None));

    let cache = ResolveCache::new(
        resolver.clone(),
        Duration::from_secs(300),
        Duration::from_secs(300),
        100,
    );
    let descriptor = cache.resolve("clip#abc").await.unwrap();
    assert_eq!(descriptor.sd_hash, packed.manifest_hash);
    cache.resolve("clip#abc").await.unwrap();
    assert_eq!(resolver.calls(), 1);
}
