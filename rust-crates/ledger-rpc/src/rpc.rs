use anyhow::Context;
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::Value;
use std::{
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
    time::Duration,
};
use thiserror::Error;
use tracing::trace;
use vault_sync::RemoteError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RPC node responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// Error object returned by the node; the message is shown as is.
    #[error("{message}")]
    Node { code: i64, message: String },
    #[error("Malformed RPC response: {0}")]
    Malformed(String),
}

impl From<RpcError> for RemoteError {
    fn from(err: RpcError) -> Self {
        RemoteError::new(err.to_string())
    }
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<NodeError>,
}

#[derive(Deserialize)]
struct NodeError {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC 2.0 client over HTTP.
#[derive(Debug)]
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client for RPC node")?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(id, method, "rpc request");
        let res = self
            .http
            .post(&self.url)
            .json(&Request {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(RpcError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        parse_response(&bytes)
    }
}

fn parse_response<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RpcError> {
    let response: Response = serde_json::from_slice(bytes)
        .map_err(|err| RpcError::Malformed(err.to_string()))?;
    if let Some(NodeError { code, message }) = response.error {
        return Err(RpcError::Node { code, message });
    }
    serde_json::from_value(response.result.unwrap_or(Value::Null))
        .map_err(|err| RpcError::Malformed(err.to_string()))
}
