//! Common utilities shared by the CLI, the session controller and the supervisor

pub mod config;
pub mod envfile;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Banner delve prints once its JSON-RPC server accepts connections
const LISTEN_BANNER: &str = "API server listening at:";

/// Parse an "API server listening at:" address from delve's output.
/// Handles IPv6 format [::]:PORT by converting to 127.0.0.1:PORT
pub fn parse_listen_address(line: &str) -> Option<String> {
    let addr_start = line.find(LISTEN_BANNER)?;
    let addr = line[addr_start + LISTEN_BANNER.len()..].trim();
    if addr.is_empty() {
        return None;
    }
    let addr = if let Some(port) = addr.strip_prefix("[::]:") {
        format!("127.0.0.1:{}", port)
    } else {
        addr.to_string()
    };
    Some(addr)
}
