//! Typed JSON-RPC client.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::protocol::{JSONRPC_VERSION, Request, Response, RpcError};
use crate::transport::{Transport, UnixTransport};

/// JSON-RPC client for an SPDK application.
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    id_counter: AtomicU64,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            id_counter: AtomicU64::new(1),
        }
    }

    /// Client for the SPDK RPC socket at `path`.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(UnixTransport::new(path)))
    }

    fn next_id(&self) -> u64 {
        self.id_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Issue `method` with optional `params` and decode its result.
    pub async fn call<P, R>(&self, method: &str, params: Option<&P>) -> Result<R, RpcError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let id = self.next_id();
        let request = serde_json::to_vec(&Request {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        })?;

        debug!(method, id, "sending spdk request");
        let raw = self.transport.round_trip(&request).await?;
        let response: Response = serde_json::from_slice(&raw)?;
        let result = response.into_result(id, method)?;
        debug!(method, id, %result, "received spdk response");

        serde_json::from_value(result).map_err(|source| RpcError::Decode {
            method: method.to_string(),
            source,
        })
    }
}
