//! NVIDIA SNAP controller calls.
//!
//! Field names follow the SNAP RPC schema exactly; do not rename them.

use serde::{Deserialize, Serialize};

use crate::client::RpcClient;
use crate::protocol::RpcError;

pub const CONTROLLER_VIRTIO_BLK_CREATE: &str = "controller_virtio_blk_create";
pub const CONTROLLER_VIRTIO_BLK_DELETE: &str = "controller_virtio_blk_delete";
pub const CONTROLLER_LIST: &str = "controller_list";
pub const CONTROLLER_VIRTIO_BLK_GET_IOSTAT: &str = "controller_virtio_blk_get_iostat";

/// Controller type tag reported by `controller_list` for virtio-blk.
pub const CONTROLLER_TYPE_VIRTIO_BLK: &str = "virtio_blk";

/// Parameters of `controller_virtio_blk_create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtioBlkCreateParams {
    pub serial: String,
    /// Name of the backing bdev.
    pub bdev: String,
    pub pf_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vf_id: Option<u32>,
    pub num_queues: u32,
    pub bdev_type: String,
    pub emulation_manager: String,
}

/// Parameters of `controller_virtio_blk_delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtioBlkDeleteParams {
    pub name: String,
    pub force: bool,
}

/// One entry of `controller_list`. The listing mixes controller types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerListEntry {
    pub name: String,
    #[serde(default)]
    pub emulation_manager: Option<String>,
    #[serde(rename = "type")]
    pub controller_type: String,
    pub pci_index: u32,
    #[serde(default)]
    pub pci_bdf: Option<String>,
}

impl ControllerListEntry {
    pub fn is_virtio_blk(&self) -> bool {
        self.controller_type == CONTROLLER_TYPE_VIRTIO_BLK
    }
}

/// Result of `controller_virtio_blk_get_iostat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoStatResult {
    #[serde(default)]
    pub controllers: Vec<ControllerIoStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerIoStat {
    pub name: String,
    #[serde(default)]
    pub bdevs: Vec<BdevIoStat>,
}

/// Per-bdev counters. SNAP reports more fields; only the op counts are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BdevIoStat {
    pub bdev_name: String,
    #[serde(default)]
    pub read_ios: u64,
    #[serde(default)]
    pub write_ios: u64,
}

impl IoStatResult {
    /// Find the counters of the bdev named exactly `name`, across all controllers.
    pub fn find_bdev(&self, name: &str) -> Option<&BdevIoStat> {
        self.controllers
            .iter()
            .flat_map(|c| c.bdevs.iter())
            .find(|b| b.bdev_name == name)
    }
}

impl RpcClient {
    /// Create a virtio-blk controller. Returns the backend's controller
    /// name, or an empty string if SNAP refused without raising an error.
    pub async fn controller_virtio_blk_create(
        &self,
        params: &VirtioBlkCreateParams,
    ) -> Result<String, RpcError> {
        self.call(CONTROLLER_VIRTIO_BLK_CREATE, Some(params)).await
    }

    pub async fn controller_virtio_blk_delete(
        &self,
        params: &VirtioBlkDeleteParams,
    ) -> Result<bool, RpcError> {
        self.call(CONTROLLER_VIRTIO_BLK_DELETE, Some(params)).await
    }

    pub async fn controller_list(&self) -> Result<Vec<ControllerListEntry>, RpcError> {
        self.call::<(), _>(CONTROLLER_LIST, None).await
    }

    pub async fn controller_virtio_blk_get_iostat(&self) -> Result<IoStatResult, RpcError> {
        self.call::<(), _>(CONTROLLER_VIRTIO_BLK_GET_IOSTAT, None)
            .await
    }
}
