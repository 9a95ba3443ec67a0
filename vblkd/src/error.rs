//! Error types for the virtio-blk service.

use std::io;

use spdk_rpc::RpcError;
use thiserror::Error;
use tonic::Status;

pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for validating required fields.
///
/// Returns `INVALID_ARGUMENT` status if the field is missing or empty.
pub trait Require<T> {
    fn require(self, name: &str) -> std::result::Result<T, Status>;
}

impl Require<String> for String {
    fn require(self, name: &str) -> std::result::Result<String, Status> {
        if self.is_empty() {
            Err(Status::invalid_argument(format!("{name} is required")))
        } else {
            Ok(self)
        }
    }
}

impl<T> Require<T> for Option<T> {
    fn require(self, name: &str) -> std::result::Result<T, Status> {
        self.ok_or_else(|| Status::invalid_argument(format!("{name} is required")))
    }
}

/// Service errors with structured context.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid resource id {id:?}: {reason}")]
    InvalidResourceId { id: String, reason: &'static str },

    #[error("invalid resource name {name:?}: {reason}")]
    InvalidResourceName { name: String, reason: String },

    #[error("invalid field mask path {path:?}: {reason}")]
    InvalidFieldMask { path: String, reason: &'static str },

    #[error("negative page size is not allowed: {0}")]
    NegativePageSize(i32),

    #[error("unable to find pagination token {0}")]
    PageTokenNotFound(String),

    #[error("unable to find controller {0}")]
    ControllerNotFound(String),

    #[error("could not create virtio-blk: {0}")]
    CreateRejected(String),

    #[error("could not find controller: {0}")]
    UnknownController(String),

    #[error("could not find controller {0} in the backend listing")]
    BackendControllerMissing(String),

    #[error("could not find controller stats: {0}")]
    StatsNotFound(String),

    #[error("{0} method is not implemented")]
    Unimplemented(&'static str),

    #[error("spdk call failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(io::Error),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid configuration: {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        match &err {
            // NOT_FOUND: Resource or cursor does not exist
            Error::ControllerNotFound(_) | Error::PageTokenNotFound(_) => {
                tonic::Status::not_found(err.to_string())
            }

            // INVALID_ARGUMENT: Client provided invalid input, or the backend
            // refused it without raising an RPC error
            Error::InvalidResourceId { .. }
            | Error::InvalidResourceName { .. }
            | Error::InvalidFieldMask { .. }
            | Error::NegativePageSize(_)
            | Error::CreateRejected(_)
            | Error::UnknownController(_)
            | Error::BackendControllerMissing(_)
            | Error::StatsNotFound(_) => tonic::Status::invalid_argument(err.to_string()),

            Error::Unimplemented(_) => tonic::Status::unimplemented(err.to_string()),

            // UNAVAILABLE: The backend could not be reached
            Error::Rpc(rpc) if rpc.is_transport() => tonic::Status::unavailable(err.to_string()),

            // INTERNAL: Backend protocol failures and infrastructure errors
            Error::Rpc(_) | Error::Io(_) | Error::Json(_) => {
                tonic::Status::internal(err.to_string())
            }
        }
    }
}
