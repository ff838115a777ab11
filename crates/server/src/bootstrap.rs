//! Startup wiring: key loading and state construction.

use crate::state::AppState;
use anyhow::{Context, Result};
use spool_core::config::{AppConfig, PaidConfig, PublicKeyConfig};
use spool_player::{AccessVerifier, Player, SdkResolver};
use spool_signer::{PublicKey, TokenVerifier};
use std::sync::Arc;
use std::time::Duration;

const KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Load the token verification key, if one is configured.
pub async fn load_public_key(config: &PaidConfig) -> Result<Option<PublicKey>> {
    let Some(source) = &config.public_key else {
        return Ok(None);
    };

    let text = match source {
        PublicKeyConfig::Value { key } => key.clone(),
        PublicKeyConfig::File { path } => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read public key file: {}", path.display()))?,
        PublicKeyConfig::Url { url } => {
            let client = reqwest::Client::builder()
                .timeout(KEY_FETCH_TIMEOUT)
                .build()
                .context("failed to build http client")?;
            let response = client
                .get(url)
                .send()
                .await
                .with_context(|| format!("failed to fetch public key from {url}"))?
                .error_for_status()
                .with_context(|| format!("public key server rejected request: {url}"))?;
            response
                .text()
                .await
                .with_context(|| format!("failed to read public key from {url}"))?
        }
    };

    let (name, key) = PublicKey::parse(&text).context("failed to parse public key")?;
    tracing::info!(key_name = %name, "Loaded paid-content public key");
    Ok(Some(key))
}

/// Build the application state from configuration: blob source chain,
/// resolver, access verifier and player.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let source = spool_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = source.backend_name(), "Blob source initialized");

    let resolver = SdkResolver::new(&config.resolver.address, config.resolver.timeout())
        .context("failed to create resolver client")?;
    tracing::info!(address = %config.resolver.address, "Resolver configured");

    let verifier = load_public_key(&config.paid)
        .await?
        .map(TokenVerifier::new);

    let access = AccessVerifier::new(verifier);
    if !access.has_key() {
        tracing::warn!("No paid-content public key configured, priced content will be refused");
    }

    let player = Player::new(
        Arc::new(resolver),
        source,
        access,
        &config.player,
        &config.throttle,
    );
    tracing::info!(
        hot_cache_bytes = config.player.hot_cache_bytes,
        prefetch_depth = player.prefetch_depth(),
        throttle_enabled = config.throttle.enabled,
        paid_content = player.accepts_paid(),
        "Player initialized"
    );

    Ok(AppState::new(config, player))
}
