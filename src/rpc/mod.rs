//! JSON-RPC client for delve's headless API (v2)
//!
//! This module implements the transport the session controller talks
//! through: one TCP connection, one request in flight at a time.

pub mod client;
pub mod codec;
pub mod types;

pub use client::{Connector, RpcClient, TcpConnector, Transport};
pub use types::*;
