//! Control socket server.
//!
//! Accepts connections on the control socket and serves each on its own
//! task. Requests on one connection are handled in order.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use spdk_rpc::RpcClient;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tonic::Status;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::control::{Request, Response};
use crate::error::Result;
use crate::state::ServiceState;
use crate::virtio_blk::VirtioBlkService;

/// Longest control request line accepted, newline included.
pub const CONTROL_LINE_MAX_BYTES: usize = 1024 * 1024;

pub struct Server {
    state: Arc<ServiceState>,
    service: Arc<VirtioBlkService>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let rpc = RpcClient::unix(config.spdk.socket.clone());
        Self::with_state(Arc::new(ServiceState::new(config, rpc)))
    }

    pub fn with_state(state: Arc<ServiceState>) -> Self {
        let service = Arc::new(VirtioBlkService::new(Arc::clone(&state)));
        Self { state, service }
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Bind the control socket, replacing a stale socket file.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(&self) -> Result<UnixListener> {
        let path = &self.state.config.socket;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(UnixListener::bind(path)?)
    }

    /// Serve connections until accepting fails.
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            let (stream, _) = listener.accept().await?;
            let service = Arc::clone(&self.service);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, service).await {
                    error!(error = %e, "control connection error");
                }
            });
        }
    }

    /// Remove the control socket file, if present.
    pub fn cleanup(&self) {
        remove_socket(&self.state.config.socket);
    }
}

fn remove_socket(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        error!(path = %path.display(), error = %e, "failed to remove control socket");
    }
}

async fn handle_connection(stream: UnixStream, service: Arc<VirtioBlkService>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let limit = CONTROL_LINE_MAX_BYTES as u64 + 1;
        if (&mut reader).take(limit).read_line(&mut line).await? == 0 {
            return Ok(());
        }
        if line.len() > CONTROL_LINE_MAX_BYTES {
            // The rest of the line is still unread, so the stream cannot be
            // resynchronized.
            warn!(max_bytes = CONTROL_LINE_MAX_BYTES, "control request too large");
            let response: Response = Status::invalid_argument(format!(
                "request exceeds {CONTROL_LINE_MAX_BYTES} bytes"
            ))
            .into();
            let resp = serde_json::to_string(&response)? + "\n";
            writer.write_all(resp.as_bytes()).await?;
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(&service, request).await,
            Err(e) => {
                debug!(error = %e, "malformed control request");
                Status::invalid_argument(format!("malformed request: {e}")).into()
            }
        };

        let resp = serde_json::to_string(&response)? + "\n";
        writer.write_all(resp.as_bytes()).await?;
    }
}

/// Route a control request to the matching service operation.
pub async fn dispatch(service: &VirtioBlkService, request: Request) -> Response {
    let result = match request {
        Request::Create(req) => service.create_virtio_blk(req).await.map(Response::VirtioBlk),
        Request::Delete(req) => service.delete_virtio_blk(req).await.map(|()| Response::Empty),
        Request::Update(req) => service.update_virtio_blk(req).await.map(Response::VirtioBlk),
        Request::List(req) => service.list_virtio_blks(req).await.map(Response::List),
        Request::Get(req) => service.get_virtio_blk(req).await.map(Response::VirtioBlk),
        Request::Stats(req) => service.virtio_blk_stats(req).await.map(Response::Stats),
    };
    result.unwrap_or_else(Response::from)
}
