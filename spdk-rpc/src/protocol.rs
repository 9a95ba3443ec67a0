//! JSON-RPC 2.0 envelope types.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// Maximum size of a single response. Listings of a few thousand
/// controllers stay well below this.
pub const RESPONSE_MAX_BYTES: usize = 16 * 1024 * 1024;

/// A request object as written to the socket.
#[derive(Debug, Serialize)]
pub struct Request<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a P>,
}

/// A response object as read from the socket.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

/// The `error` member of a response.
///
/// SNAP fills in `{"code": 0, "message": ""}` on success, so only a nonzero
/// code is a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Response {
    /// Check the envelope against the request it answers and extract the result.
    pub fn into_result(self, expected_id: u64, method: &str) -> Result<Value, RpcError> {
        if let Some(error) = self.error
            && error.code != 0
        {
            return Err(RpcError::Server {
                code: error.code,
                message: error.message,
            });
        }

        if let Some(actual) = self.id
            && actual != expected_id
        {
            return Err(RpcError::IdMismatch {
                expected: expected_id,
                actual,
            });
        }

        self.result.ok_or_else(|| RpcError::MissingResult {
            method: method.to_string(),
        })
    }
}

/// Errors raised while talking to the backend.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("spdk error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("response id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: u64, actual: u64 },

    #[error("response to {method} has no result")]
    MissingResult { method: String },

    #[error("response too large (max: {max_bytes} bytes)")]
    ResponseTooLarge { max_bytes: usize },

    #[error("connection closed before a complete response was received")]
    ConnectionClosed,

    #[error("failed to decode {method} result: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed json-rpc message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl RpcError {
    /// Whether the failure happened below the JSON-RPC layer, i.e. the
    /// backend may never have seen the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed)
    }
}
