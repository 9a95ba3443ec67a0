//! vblkd: management API for virtio-blk controllers.
//!
//! Controllers are emulated by an SPDK/SNAP target and driven over its
//! JSON-RPC socket. The daemon keeps a registry of the controllers it
//! created and serves Create, Delete, Update, List, Get, and Stats over a
//! line-delimited JSON control socket.

// tonic::Status is large by design (176 bytes)
#![allow(clippy::result_large_err)]

pub mod config;
pub mod control;
pub mod error;
pub mod identity;
pub mod server;
pub mod state;
pub mod types;
pub mod virtio_blk;

pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use server::Server;
pub use virtio_blk::VirtioBlkService;

#[cfg(test)]
pub(crate) mod test_util;
