//! JSON-RPC client for the SPDK/SNAP storage control plane.
//!
//! SPDK applications (and NVIDIA SNAP on top of them) expose their control
//! plane as JSON-RPC 2.0 over a Unix domain socket. This crate provides the
//! envelope types, a pluggable [`Transport`], a typed [`RpcClient`], and the
//! request/result models of the SNAP virtio-blk controller calls.
//!
//! Based on https://spdk.io/doc/jsonrpc.html

mod client;
mod protocol;
mod snap;
mod transport;

pub use client::RpcClient;
pub use protocol::*;
pub use snap::*;
pub use transport::{Transport, UnixTransport};
