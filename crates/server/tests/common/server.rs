//! Server test utilities.

use crate::common::fixtures::{MockResolver, RecordingReporter, TamperingSource, claim_for};
use spool_core::config::AppConfig;
use spool_core::{PackedStream, pack};
use spool_player::{AccessVerifier, Player};
use spool_server::{AppState, create_router};
use spool_signer::{KeyPair, TokenIssuer, TokenVerifier};
use spool_storage::BlobStore;
use std::sync::Arc;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub source: Arc<TamperingSource>,
    pub resolver: Arc<MockResolver>,
    pub reporter: Arc<RecordingReporter>,
    pub issuer: TokenIssuer,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with in-memory blobs and throttling off.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test server with custom config modifications.
    pub fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = AppConfig::for_testing();
        config.server.instance_name = Some("test-player".to_string());
        modifier(&mut config);

        let source = Arc::new(TamperingSource::new());
        let resolver = Arc::new(MockResolver::default());
        let reporter = Arc::new(RecordingReporter::default());
        let keys = KeyPair::generate("paid-test");

        let player = Player::new(
            resolver.clone(),
            source.clone(),
            AccessVerifier::new(Some(TokenVerifier::new(keys.public.clone()))),
            &config.player,
            &config.throttle,
        );
        let state = AppState::new(config, player).with_reporter(reporter.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            source,
            resolver,
            reporter,
            issuer: TokenIssuer::new(keys.secret),
        }
    }

    /// Pack `data`, store its blobs and register a claim for it.
    pub async fn publish(
        &self,
        name: &str,
        claim_id: &str,
        data: &[u8],
        chunk_size: usize,
        fee: Option<f64>,
    ) -> PackedStream {
        let packed = pack(data, chunk_size, name, "").expect("Failed to pack stream");
        for (hash, blob) in packed.blobs() {
            self.source
                .store
                .put(&hash, blob)
                .await
                .expect("Failed to store blob");
        }
        self.resolver.insert(
            &format!("{name}#{claim_id}"),
            claim_for(&packed, name, claim_id, fee),
        );
        packed
    }
}
