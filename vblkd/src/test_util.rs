//! Shared test utilities for service tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use spdk_rpc::{RpcClient, RpcError, Transport};

use crate::config::Config;
use crate::state::ServiceState;
use crate::virtio_blk::VirtioBlkService;

/// Backend stand-in that answers requests with scripted responses.
///
/// Responses are written without an `id`; the request id is filled in.
/// Running out of responses looks like the backend hanging up. Every call
/// yields once before answering.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    pub fn push(&self, response: Value) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Methods called so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>, RpcError> {
        let request: Value = serde_json::from_slice(request)?;
        let id = request["id"].clone();
        self.requests.lock().unwrap().push(request);

        let mut response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(RpcError::ConnectionClosed)?;
        response["id"] = id;
        // Suspend like a real socket would, so concurrent calls interleave.
        tokio::task::yield_now().await;
        Ok(serde_json::to_vec(&response)?)
    }
}

/// Test fixture providing an isolated service over a scripted backend.
pub struct TestFixture {
    pub state: Arc<ServiceState>,
    pub backend: Arc<ScriptedTransport>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let backend = Arc::new(ScriptedTransport::default());
        let rpc = RpcClient::new(backend.clone());
        let state = Arc::new(ServiceState::new(config, rpc));
        Self { state, backend }
    }

    pub fn service(&self) -> VirtioBlkService {
        VirtioBlkService::new(Arc::clone(&self.state))
    }

    /// Script a successful response carrying `result`.
    pub fn respond(&self, result: Value) {
        self.backend
            .push(json!({"jsonrpc": "2.0", "error": {"code": 0, "message": ""}, "result": result}));
    }

    /// Script an error response.
    pub fn respond_error(&self, code: i32, message: &str) {
        self.backend
            .push(json!({"jsonrpc": "2.0", "error": {"code": code, "message": message}}));
    }

    /// Script a `controller_list` response from `(name, type, pci_index)` triples.
    pub fn respond_list(&self, entries: &[(&str, &str, u32)]) {
        let entries: Vec<Value> = entries
            .iter()
            .map(|(name, ty, pci_index)| {
                json!({
                    "name": name,
                    "emulation_manager": "mlx5_0",
                    "type": ty,
                    "pci_index": pci_index,
                })
            })
            .collect();
        self.respond(Value::Array(entries));
    }
}
