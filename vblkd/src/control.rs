//! Control protocol for vblkd <-> vblkctl communication over Unix Domain Socket.
//!
//! One JSON-encoded [`Request`] per line, answered by one [`Response`] line.

use serde::{Deserialize, Serialize};
use tonic::{Code, Status};

use crate::types::{
    CreateVirtioBlkRequest, DeleteVirtioBlkRequest, GetVirtioBlkRequest, ListVirtioBlksRequest,
    ListVirtioBlksResponse, UpdateVirtioBlkRequest, VirtioBlk, VirtioBlkStatsRequest,
    VirtioBlkStatsResponse,
};

/// Request from vblkctl to vblkd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Create(CreateVirtioBlkRequest),
    Delete(DeleteVirtioBlkRequest),
    Update(UpdateVirtioBlkRequest),
    List(ListVirtioBlksRequest),
    Get(GetVirtioBlkRequest),
    Stats(VirtioBlkStatsRequest),
}

/// Response from vblkd to vblkctl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    VirtioBlk(VirtioBlk),
    Empty,
    List(ListVirtioBlksResponse),
    Stats(VirtioBlkStatsResponse),
    /// Failed request. `code` is the numeric gRPC status code.
    Error { code: i32, message: String },
}

impl Response {
    /// Status carried by an `Error` response, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Response::Error { code, message } => {
                Some(Status::new(Code::from(*code), message.clone()))
            }
            _ => None,
        }
    }
}

impl From<Status> for Response {
    fn from(status: Status) -> Self {
        Response::Error {
            code: status.code() as i32,
            message: status.message().to_string(),
        }
    }
}
