//! dlv-remote - remote control for a headless Delve debugger
//!
//! This library drives delve's JSON-RPC API (v2): it tracks the debuggee's
//! execution state, serializes control commands, and keeps breakpoints
//! alive across debugger restarts.

pub mod cli;
pub mod commands;
pub mod common;
pub mod format;
pub mod rpc;
pub mod server;
pub mod session;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use session::{BreakpointKey, DebugSession, SessionState, StepCommand};
