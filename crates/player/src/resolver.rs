//! Content index client.
//!
//! The index answers `resolve` with a claim per requested URI. Claims are
//! converted into [`ContentDescriptor`]s in exactly one place,
//! [`descriptor_from_claim`].

use crate::error::{PlayerError, PlayerResult};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use spool_core::{BlobHash, ContentDescriptor, Fee};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;

/// Looks up claims by URI.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Resolve one URI. The result maps each requested URI to whatever the
    /// index returned for it; the entry may be missing or carry an error.
    async fn resolve(&self, uri: &str) -> PlayerResult<HashMap<String, Claim>>;
}

/// A claim as returned by the index. Every field is optional on the wire.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub canonical_url: String,
    #[serde(default)]
    pub claim_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub value: ClaimValue,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClaimValue {
    #[serde(default)]
    pub source: Option<ClaimSource>,
    #[serde(default)]
    pub fee: Option<ClaimFee>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub release_time: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClaimSource {
    #[serde(default)]
    pub sd_hash: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub size: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClaimFee {
    #[serde(default, deserialize_with = "de_f64")]
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub address: String,
}

// The index encodes numbers as strings in some fields and as numbers in others.

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(number_from).unwrap_or(0.0))
}

/// Turn the index's answer for `uri` into a descriptor.
///
/// A claim without a canonical URL, or without a stream source, is
/// `StreamNotFound`.
pub fn descriptor_from_claim(uri: &str, claim: &Claim) -> PlayerResult<ContentDescriptor> {
    if claim.canonical_url.is_empty() {
        return Err(PlayerError::StreamNotFound);
    }
    let source = claim
        .value
        .source
        .as_ref()
        .filter(|s| !s.sd_hash.is_empty())
        .ok_or(PlayerError::StreamNotFound)?;
    let sd_hash = BlobHash::from_hex(&source.sd_hash)
        .map_err(|e| PlayerError::InvalidStream(format!("bad sd_hash for {uri}: {e}")))?;

    let (uri_name, uri_id) = uri.split_once('#').unwrap_or((uri, ""));
    let claim_name = if claim.name.is_empty() {
        uri_name.to_string()
    } else {
        claim.name.clone()
    };
    let claim_id = if claim.claim_id.is_empty() {
        uri_id.to_string()
    } else {
        claim.claim_id.clone()
    };

    let timestamp = claim
        .value
        .release_time
        .or(claim.timestamp)
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    let fee = claim.value.fee.as_ref().map(|f| Fee {
        amount: f.amount,
        currency: f.currency.clone(),
        address: f.address.clone(),
    });

    Ok(ContentDescriptor {
        uri: uri.to_string(),
        canonical_url: claim.canonical_url.clone(),
        claim_name,
        claim_id,
        sd_hash,
        size: source.size,
        content_type: source.media_type.clone().filter(|t| !t.is_empty()),
        timestamp,
        source_name: source.name.clone().filter(|n| !n.is_empty()),
        fee,
    })
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<HashMap<String, Claim>>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC 2.0 client for the SDK `resolve` method.
pub struct SdkResolver {
    client: reqwest::Client,
    address: String,
    next_id: AtomicU64,
}

impl SdkResolver {
    pub fn new(address: &str, timeout: Duration) -> PlayerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlayerError::Resolver(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            address: address.to_string(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl Resolver for SdkResolver {
    async fn resolve(&self, uri: &str) -> PlayerResult<HashMap<String, Claim>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "method": "resolve",
            "params": { "urls": [uri] },
            "id": id,
        });

        let response = self
            .client
            .post(&self.address)
            .json(&request)
            .send()
            .await
            .map_err(|e| PlayerError::Resolver(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PlayerError::Resolver(format!(
                "resolver returned {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| PlayerError::Resolver(format!("invalid resolver response: {e}")))?;
        if let Some(err) = body.error {
            return Err(PlayerError::Resolver(format!(
                "resolver error {}: {}",
                err.code, err.message
            )));
        }
        Ok(body.result.unwrap_or_default())
    }
}
