//! API resource and request types.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Opaque reference to another object, e.g. the backing volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey {
    pub value: String,
}

impl ObjectKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Location of the emulated function on the host PCIe topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciEndpoint {
    pub physical_function: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_function: Option<u32>,
}

/// A virtio-blk controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtioBlk {
    /// Full resource name, `//storage.opiproject.org/volumes/{id}`.
    pub name: String,
    pub pcie_id: Option<PciEndpoint>,
    pub volume_id: Option<ObjectKey>,
    pub max_io_qps: u32,
}

/// Fields of [`VirtioBlk`] addressable by a field mask.
pub const VIRTIO_BLK_FIELDS: &[&str] = &[
    "name",
    "pcie_id",
    "pcie_id.physical_function",
    "pcie_id.virtual_function",
    "volume_id",
    "max_io_qps",
];

/// Subset of resource fields an update may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMask {
    pub paths: Vec<String>,
}

impl FieldMask {
    pub const WILDCARD: &'static str = "*";

    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Check every path against the fields of [`VirtioBlk`].
    ///
    /// A lone `*` selects every field; mixing it with other paths is an error.
    pub fn validate_for_virtio_blk(&self) -> Result<(), Error> {
        if self.paths.iter().any(|p| p == Self::WILDCARD) {
            if self.paths.len() == 1 {
                return Ok(());
            }
            return Err(Error::InvalidFieldMask {
                path: Self::WILDCARD.to_string(),
                reason: "wildcard must be the only path",
            });
        }

        for path in &self.paths {
            if path.is_empty() {
                return Err(Error::InvalidFieldMask {
                    path: path.clone(),
                    reason: "path is empty",
                });
            }
            if !VIRTIO_BLK_FIELDS.contains(&path.as_str()) {
                return Err(Error::InvalidFieldMask {
                    path: path.clone(),
                    reason: "no such field in VirtioBlk",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateVirtioBlkRequest {
    pub virtio_blk: Option<VirtioBlk>,
    /// Caller-chosen id. A fresh one is generated when absent or empty.
    pub virtio_blk_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteVirtioBlkRequest {
    pub name: String,
    pub allow_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateVirtioBlkRequest {
    pub virtio_blk: Option<VirtioBlk>,
    pub update_mask: Option<FieldMask>,
    pub allow_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListVirtioBlksRequest {
    /// Zero selects the server default.
    pub page_size: i32,
    pub page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListVirtioBlksResponse {
    pub virtio_blks: Vec<VirtioBlk>,
    /// Empty on the last page.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetVirtioBlkRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtioBlkStatsRequest {
    pub controller_id: Option<ObjectKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub read_ops_count: u64,
    pub write_ops_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtioBlkStatsResponse {
    pub id: ObjectKey,
    pub stats: VolumeStats,
}
