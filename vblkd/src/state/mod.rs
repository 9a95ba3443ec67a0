//! Service state shared by every request.
//!
//! - `ControllerRegistry`: last-known representation of each controller this
//!   process created, keyed by resource name
//! - `PageCursors`: outstanding list page tokens
//!
//! Both are process-lifetime only. Each map has its own lock, held only for
//! the map access and never across a backend call.

mod pagination;
mod registry;

pub use pagination::{PageCursors, PageWindow};
pub use registry::ControllerRegistry;

use spdk_rpc::RpcClient;

use crate::config::Config;

/// Shared service state.
pub struct ServiceState {
    pub config: Config,
    pub rpc: RpcClient,
    pub controllers: ControllerRegistry,
    pub cursors: PageCursors,
}

impl ServiceState {
    pub fn new(config: Config, rpc: RpcClient) -> Self {
        Self {
            config,
            rpc,
            controllers: ControllerRegistry::new(),
            cursors: PageCursors::new(),
        }
    }
}
