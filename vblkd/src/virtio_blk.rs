//! Virtio-blk controller lifecycle.
//!
//! Every operation consults the local [`ControllerRegistry`] first and only
//! goes to the backend when an authoritative answer is needed. The registry
//! is the idempotency record for Create and the existence gate for Delete,
//! Update, and Get; the backend listing is authoritative for List and for
//! what Get returns.
//!
//! [`ControllerRegistry`]: crate::state::ControllerRegistry

use std::sync::Arc;

use spdk_rpc::{ControllerListEntry, RpcError, VirtioBlkCreateParams, VirtioBlkDeleteParams};
use tonic::Status;
use tracing::{debug, info, warn};

use crate::error::{Error, Require};
use crate::identity::{ResourceIdentity, resource_id, resource_name, validate_resource_name};
use crate::state::ServiceState;
use crate::types::{
    CreateVirtioBlkRequest, DeleteVirtioBlkRequest, GetVirtioBlkRequest, ListVirtioBlksRequest,
    ListVirtioBlksResponse, ObjectKey, PciEndpoint, UpdateVirtioBlkRequest, VirtioBlk,
    VirtioBlkStatsRequest, VirtioBlkStatsResponse, VolumeStats,
};

pub struct VirtioBlkService {
    state: Arc<ServiceState>,
}

/// Log a failed backend call and convert it for the caller.
fn backend_failure(method: &'static str, err: RpcError) -> Status {
    warn!(method, error = %err, "spdk call failed");
    Error::Rpc(err).into()
}

/// Log a rejected request and convert the error for the caller.
fn rejected(operation: &'static str, err: Error) -> Status {
    warn!(operation, error = %err, "request rejected");
    err.into()
}

impl VirtioBlkService {
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self { state }
    }

    /// Build the API view of a backend listing entry.
    ///
    /// The listing carries no volume or queue count; those come from the
    /// registry when this process created the controller.
    fn controller_from_backend(&self, entry: &ControllerListEntry) -> VirtioBlk {
        let name = resource_name(&entry.name);
        let known = self.state.controllers.get(&name);
        VirtioBlk {
            pcie_id: Some(PciEndpoint {
                physical_function: entry.pci_index,
                virtual_function: None,
            }),
            volume_id: known.as_ref().and_then(|c| c.volume_id.clone()),
            max_io_qps: known.map_or(0, |c| c.max_io_qps),
            name,
        }
    }

    /// Create a controller, or return the existing one if the derived
    /// name is already registered.
    ///
    /// An existing entry is returned as-is even when the request payload
    /// differs from it.
    pub async fn create_virtio_blk(
        &self,
        request: CreateVirtioBlkRequest,
    ) -> Result<VirtioBlk, Status> {
        info!(?request, "CreateVirtioBlk");
        let mut virtio_blk = request.virtio_blk.require("virtio_blk")?;

        let identity = ResourceIdentity::assign(request.virtio_blk_id.as_deref())
            .map_err(|e| rejected("CreateVirtioBlk", e))?;
        if !virtio_blk.name.is_empty() && virtio_blk.name != identity.name {
            debug!(
                id = %identity.id,
                ignored = %virtio_blk.name,
                "name field is derived from the resource id, ignoring supplied name"
            );
        }
        virtio_blk.name = identity.name.clone();

        if let Some(existing) = self.state.controllers.get(&virtio_blk.name) {
            info!(name = %existing.name, "virtio-blk controller already exists");
            return Ok(existing);
        }

        let pcie_id = virtio_blk
            .pcie_id
            .clone()
            .require("virtio_blk.pcie_id")?;
        let volume = virtio_blk
            .volume_id
            .clone()
            .require("virtio_blk.volume_id")?
            .value
            .require("virtio_blk.volume_id")?;
        if virtio_blk.max_io_qps == 0 {
            return Err(Status::invalid_argument(
                "virtio_blk.max_io_qps must be positive",
            ));
        }

        let emulation = &self.state.config.emulation;
        let params = VirtioBlkCreateParams {
            serial: identity.id.clone(),
            bdev: volume,
            pf_id: pcie_id.physical_function,
            vf_id: None,
            num_queues: virtio_blk.max_io_qps,
            bdev_type: emulation.bdev_type.clone(),
            emulation_manager: emulation.emulation_manager.clone(),
        };

        let backend_name = self
            .state
            .rpc
            .controller_virtio_blk_create(&params)
            .await
            .map_err(|e| backend_failure(spdk_rpc::CONTROLLER_VIRTIO_BLK_CREATE, e))?;
        if backend_name.is_empty() {
            return Err(rejected(
                "CreateVirtioBlk",
                Error::CreateRejected(identity.id),
            ));
        }

        info!(
            name = %virtio_blk.name,
            backend_name,
            pf_id = params.pf_id,
            bdev = %params.bdev,
            "virtio-blk controller created"
        );
        Ok(self.state.controllers.insert_or_get(virtio_blk))
    }

    /// Delete a controller.
    ///
    /// The backend reporting `false` does not fail the call: once the
    /// delete round-trips without an RPC error the registry entry is
    /// dropped, so the local view converges to "deleted".
    pub async fn delete_virtio_blk(&self, request: DeleteVirtioBlkRequest) -> Result<(), Status> {
        info!(?request, "DeleteVirtioBlk");
        let name = request.name.require("name")?;
        validate_resource_name(&name).map_err(|e| rejected("DeleteVirtioBlk", e))?;

        let Some(controller) = self.state.controllers.get(&name) else {
            if request.allow_missing {
                info!(name = %name, "controller not found, allow_missing set");
                return Ok(());
            }
            return Err(rejected("DeleteVirtioBlk", Error::ControllerNotFound(name)));
        };

        // Send the id rather than the full resource name: it is the device
        // name the backend listing reports and Get matches against.
        let params = VirtioBlkDeleteParams {
            name: resource_id(&controller.name).to_string(),
            force: true,
        };
        let deleted = self
            .state
            .rpc
            .controller_virtio_blk_delete(&params)
            .await
            .map_err(|e| backend_failure(spdk_rpc::CONTROLLER_VIRTIO_BLK_DELETE, e))?;
        if !deleted {
            warn!(
                name = %controller.name,
                "backend could not delete controller, removing it from the registry anyway"
            );
        }

        self.state.controllers.remove(&controller.name);
        info!(name = %controller.name, "virtio-blk controller deleted");
        Ok(())
    }

    /// Validate an update. Applying it is not supported, so a valid request
    /// always ends in `UNIMPLEMENTED`.
    pub async fn update_virtio_blk(
        &self,
        request: UpdateVirtioBlkRequest,
    ) -> Result<VirtioBlk, Status> {
        info!(?request, "UpdateVirtioBlk");
        let virtio_blk = request.virtio_blk.require("virtio_blk")?;
        validate_resource_name(&virtio_blk.name).map_err(|e| rejected("UpdateVirtioBlk", e))?;

        if !self.state.controllers.contains(&virtio_blk.name) && !request.allow_missing {
            return Err(rejected(
                "UpdateVirtioBlk",
                Error::ControllerNotFound(virtio_blk.name),
            ));
        }

        if let Some(mask) = &request.update_mask {
            mask.validate_for_virtio_blk()
                .map_err(|e| rejected("UpdateVirtioBlk", e))?;
        }

        Err(Error::Unimplemented("UpdateVirtioBlk").into())
    }

    /// List virtio-blk controllers known to the backend, one page at a time.
    pub async fn list_virtio_blks(
        &self,
        request: ListVirtioBlksRequest,
    ) -> Result<ListVirtioBlksResponse, Status> {
        info!(?request, "ListVirtioBlks");
        let window = self
            .state
            .cursors
            .window(
                request.page_size,
                &request.page_token,
                &self.state.config.pagination,
            )
            .map_err(|e| rejected("ListVirtioBlks", e))?;

        let entries = self
            .state
            .rpc
            .controller_list()
            .await
            .map_err(|e| backend_failure(spdk_rpc::CONTROLLER_LIST, e))?;
        let controllers: Vec<_> = entries.into_iter().filter(|e| e.is_virtio_blk()).collect();

        debug!(
            total = controllers.len(),
            offset = window.offset,
            size = window.size,
            "limiting listing to page"
        );
        let (page, has_more) = window.apply(controllers);
        let next_page_token = if has_more {
            self.state.cursors.mint(window.next_offset())
        } else {
            String::new()
        };

        let mut virtio_blks: Vec<_> = page
            .iter()
            .map(|entry| self.controller_from_backend(entry))
            .collect();
        virtio_blks.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ListVirtioBlksResponse {
            virtio_blks,
            next_page_token,
        })
    }

    /// Get a controller this process created, as the backend currently sees it.
    pub async fn get_virtio_blk(&self, request: GetVirtioBlkRequest) -> Result<VirtioBlk, Status> {
        info!(?request, "GetVirtioBlk");
        let name = request.name.require("name")?;
        validate_resource_name(&name).map_err(|e| rejected("GetVirtioBlk", e))?;

        if !self.state.controllers.contains(&name) {
            return Err(rejected("GetVirtioBlk", Error::UnknownController(name)));
        }

        let entries = self
            .state
            .rpc
            .controller_list()
            .await
            .map_err(|e| backend_failure(spdk_rpc::CONTROLLER_LIST, e))?;

        let id = resource_id(&name);
        match entries
            .iter()
            .find(|e| e.name == id && e.is_virtio_blk())
        {
            Some(entry) => Ok(self.controller_from_backend(entry)),
            // Registered locally but gone from the backend.
            None => Err(rejected(
                "GetVirtioBlk",
                Error::BackendControllerMissing(name),
            )),
        }
    }

    /// Read/write op counts of the device named exactly `controller_id`.
    pub async fn virtio_blk_stats(
        &self,
        request: VirtioBlkStatsRequest,
    ) -> Result<VirtioBlkStatsResponse, Status> {
        info!(?request, "VirtioBlkStats");
        let controller_id = request
            .controller_id
            .require("controller_id")?
            .value
            .require("controller_id")?;
        validate_resource_name(&controller_id).map_err(|e| rejected("VirtioBlkStats", e))?;

        let iostat = self
            .state
            .rpc
            .controller_virtio_blk_get_iostat()
            .await
            .map_err(|e| backend_failure(spdk_rpc::CONTROLLER_VIRTIO_BLK_GET_IOSTAT, e))?;

        let Some(bdev) = iostat.find_bdev(&controller_id) else {
            return Err(rejected(
                "VirtioBlkStats",
                Error::StatsNotFound(controller_id),
            ));
        };

        Ok(VirtioBlkStatsResponse {
            stats: VolumeStats {
                read_ops_count: bdev.read_ios,
                write_ops_count: bdev.write_ios,
            },
            id: ObjectKey::new(controller_id),
        })
    }
}
