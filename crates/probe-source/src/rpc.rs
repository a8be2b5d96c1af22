//! Block source backed by a node's JSON-RPC interface.
//!
//! Speaks the bitcoind dialect: `getblockcount`, `getblockhash` and
//! `getblock`, authenticated with HTTP basic auth.

use std::time::Duration;

use async_trait::async_trait;
use probe_core::compact::CompactTarget;
use probe_core::params::RpcEndpoint;
use probe_core::types::BlockRecord;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SourceError;
use crate::BlockSource;

/// Per-request HTTP timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause after each block fetched, to avoid flooding the node.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(200);

pub struct RpcBlockSource {
    client: Client,
    url: String,
    user: String,
    password: String,
    request_delay: Duration,
}

/// The subset of a `getblock` reply that feeds [`BlockRecord`].
#[derive(Deserialize)]
struct RpcBlock {
    height: u64,
    time: i64,
    #[serde(default)]
    mediantime: Option<i64>,
    bits: String,
}

impl RpcBlockSource {
    pub fn new(url: &str, user: &str, password: &str) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
            user: user.to_owned(),
            password: password.to_owned(),
            request_delay: DEFAULT_REQUEST_DELAY,
        })
    }

    pub fn from_endpoint(endpoint: &RpcEndpoint) -> Result<Self, SourceError> {
        Self::new(&endpoint.url(), &endpoint.user, &endpoint.password)
    }

    /// Pause after each [`block_at`](BlockSource::block_at). Zero disables pacing.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SourceError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "hashprobe",
            "method": method,
            "params": params,
        });
        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(SourceError::Rpc {
                method: method.to_owned(),
                message: "unauthorized, check rpc user and password".to_owned(),
            });
        }
        let reply: Value = resp.json().await?;
        unwrap_result(method, reply)
    }

    // ── Convenience wrappers ──────────────────────────────────────────────────

    pub async fn get_block_count(&self) -> Result<u64, SourceError> {
        self.call("getblockcount", json!([])).await
    }

    pub async fn get_block_hash(&self, height: u64) -> Result<String, SourceError> {
        self.call("getblockhash", json!([height])).await
    }

    pub async fn get_block(&self, hash: &str) -> Result<Value, SourceError> {
        self.call("getblock", json!([hash])).await
    }
}

#[async_trait]
impl BlockSource for RpcBlockSource {
    async fn chain_height(&self) -> Result<u64, SourceError> {
        self.get_block_count().await
    }

    async fn block_at(&self, height: u64) -> Result<BlockRecord, SourceError> {
        let hash = self.get_block_hash(height).await?;
        let block = self.get_block(&hash).await?;
        let record = parse_block(block)?;
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        Ok(record)
    }
}

/// Split a JSON-RPC reply into its result or its error.
fn unwrap_result<T: DeserializeOwned>(method: &str, mut reply: Value) -> Result<T, SourceError> {
    if let Some(err) = reply.get("error") {
        if !err.is_null() {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| err.to_string());
            return Err(SourceError::Rpc {
                method: method.to_owned(),
                message,
            });
        }
    }
    let result = reply
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| SourceError::Malformed(format!("{method}: reply has no result")))?;
    serde_json::from_value(result).map_err(|e| SourceError::Malformed(format!("{method}: {e}")))
}

/// Build a [`BlockRecord`] from a `getblock` reply.
///
/// Nodes that do not report `mediantime` get the header time in its place.
fn parse_block(block: Value) -> Result<BlockRecord, SourceError> {
    let raw: RpcBlock =
        serde_json::from_value(block).map_err(|e| SourceError::Malformed(format!("getblock: {e}")))?;
    let bits: CompactTarget = raw.bits.parse()?;
    Ok(BlockRecord::new(
        raw.height,
        raw.time,
        raw.mediantime.unwrap_or(raw.time),
        bits.0,
    ))
}
