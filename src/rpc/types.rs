//! Delve JSON-RPC message types
//!
//! Field names follow the JSON tags of delve's `service/api` and
//! `service/rpc2` packages. Delve decodes parameters case-insensitively,
//! so argument structs use the Go field names.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::common::{Error, Result};

/// Fully qualified RPC method names
pub mod method {
    pub const STATE: &str = "RPCServer.State";
    pub const COMMAND: &str = "RPCServer.Command";
    pub const CREATE_BREAKPOINT: &str = "RPCServer.CreateBreakpoint";
    pub const CLEAR_BREAKPOINT: &str = "RPCServer.ClearBreakpoint";
    pub const EVAL: &str = "RPCServer.Eval";
    pub const SET: &str = "RPCServer.Set";
    pub const DETACH: &str = "RPCServer.Detach";
    pub const RESTART: &str = "RPCServer.Restart";
}

// === Base Protocol Messages ===

/// JSON-RPC 1.0 request
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    /// Go's net/rpc takes exactly one argument object
    pub params: [Value; 1],
    pub id: u64,
}

/// JSON-RPC 1.0 response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    /// Delve reports errors as plain strings
    #[serde(default)]
    pub error: Option<Value>,
}

impl RpcResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, message: &str) -> Self {
        Self {
            id: Some(id),
            result: None,
            error: Some(Value::String(message.to_string())),
        }
    }

    /// Convert into the result value, failing on any non-empty error field
    /// even when a result is present as well.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            None | Some(Value::Null) => Ok(self.result.unwrap_or(Value::Null)),
            Some(Value::String(message)) if message.is_empty() => {
                Ok(self.result.unwrap_or(Value::Null))
            }
            Some(Value::String(message)) => Err(Error::Protocol(message)),
            Some(other) => Err(Error::Protocol(other.to_string())),
        }
    }

    /// Decode the result into a typed body
    pub fn into_body<T: serde::de::DeserializeOwned>(self, method: &str) -> Result<T> {
        let value = self.into_result()?;
        serde_json::from_value(value).map_err(|e| {
            Error::Protocol(format!("Failed to parse {} response: {}", method, e))
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// === Execution State ===

/// Snapshot of the debuggee, as returned by every control command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(rename = "Pid", default)]
    pub pid: i64,
    #[serde(rename = "Running", default)]
    pub running: bool,
    #[serde(rename = "Recording", default)]
    pub recording: bool,
    #[serde(
        rename = "currentThread",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_thread: Option<CurrentThread>,
    #[serde(default)]
    pub exited: bool,
    #[serde(rename = "exitStatus", default)]
    pub exit_status: i64,
}

impl ExecutionState {
    /// Drop the current thread unless the debuggee is halted and alive
    pub fn normalized(mut self) -> Self {
        if self.running || self.exited {
            self.current_thread = None;
        }
        self
    }

    /// Goroutine to evaluate expressions in, if any
    pub fn goroutine_id(&self) -> Option<i64> {
        self.current_thread.as_ref().map(|t| t.goroutine_id)
    }
}

/// The thread the debuggee is stopped on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentThread {
    pub id: i64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(rename = "goroutineID", default)]
    pub goroutine_id: i64,
}

// === Breakpoints ===

/// Breakpoint as delve reports it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcBreakpoint {
    pub id: i64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

/// Location part of a CreateBreakpoint request
#[derive(Debug, Clone, Serialize)]
pub struct BreakpointSpec {
    pub file: String,
    pub line: u32,
}

// === Variables ===

/// Go's `reflect.Kind`, as delve numbers it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum Kind {
    #[default]
    Invalid,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Array,
    Chan,
    Func,
    Interface,
    Map,
    Ptr,
    Slice,
    String,
    Struct,
    UnsafePointer,
}

const KINDS: [Kind; 27] = [
    Kind::Invalid,
    Kind::Bool,
    Kind::Int,
    Kind::Int8,
    Kind::Int16,
    Kind::Int32,
    Kind::Int64,
    Kind::Uint,
    Kind::Uint8,
    Kind::Uint16,
    Kind::Uint32,
    Kind::Uint64,
    Kind::Uintptr,
    Kind::Float32,
    Kind::Float64,
    Kind::Complex64,
    Kind::Complex128,
    Kind::Array,
    Kind::Chan,
    Kind::Func,
    Kind::Interface,
    Kind::Map,
    Kind::Ptr,
    Kind::Slice,
    Kind::String,
    Kind::Struct,
    Kind::UnsafePointer,
];

impl From<u64> for Kind {
    fn from(n: u64) -> Self {
        usize::try_from(n)
            .ok()
            .and_then(|i| KINDS.get(i).copied())
            .unwrap_or(Kind::Invalid)
    }
}

impl From<Kind> for u64 {
    fn from(kind: Kind) -> Self {
        kind as u64
    }
}

/// Result of evaluating an expression
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub declared_type: String,
    #[serde(rename = "realType", default, deserialize_with = "null_as_default")]
    pub real_type: String,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<Variable>,
}

impl Variable {
    /// Leaf variable with a value
    pub fn leaf(name: &str, kind: Kind, value: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value: value.to_string(),
            ..Default::default()
        }
    }

    /// Composite variable with children
    pub fn composite(name: &str, kind: Kind, children: Vec<Variable>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            children,
            ..Default::default()
        }
    }
}

// === Request Arguments ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateArgs {
    pub non_blocking: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandArgs {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBreakpointArgs {
    pub breakpoint: BreakpointSpec,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClearBreakpointArgs {
    pub id: i64,
}

/// Scope an expression is evaluated in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EvalScope {
    #[serde(rename = "GoroutineID")]
    pub goroutine_id: i64,
    pub frame: i64,
}

impl EvalScope {
    pub fn goroutine(goroutine_id: i64) -> Self {
        Self {
            goroutine_id,
            frame: 0,
        }
    }
}

/// Limits on how much of a variable delve loads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadConfig {
    pub follow_pointers: bool,
    pub max_variable_recurse: i64,
    pub max_string_len: i64,
    pub max_array_values: i64,
    pub max_struct_fields: i64,
}

impl From<&crate::common::config::EvalConfig> for LoadConfig {
    fn from(cfg: &crate::common::config::EvalConfig) -> Self {
        Self {
            follow_pointers: cfg.follow_pointers,
            max_variable_recurse: cfg.max_variable_recurse,
            max_string_len: cfg.max_string_len,
            max_array_values: cfg.max_array_values,
            max_struct_fields: cfg.max_struct_fields,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        (&crate::common::config::EvalConfig::default()).into()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EvalArgs {
    pub scope: EvalScope,
    pub expr: String,
    pub cfg: LoadConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetArgs {
    pub scope: EvalScope,
    pub symbol: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetachArgs {
    pub kill: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartArgs {
    pub rebuild: bool,
}

// === Response Bodies ===

/// Body of State and Command responses
#[derive(Debug, Clone, Deserialize)]
pub struct StateBody {
    #[serde(rename = "State", alias = "state")]
    pub state: ExecutionState,
}

/// Body of CreateBreakpoint and ClearBreakpoint responses
#[derive(Debug, Clone, Deserialize)]
pub struct BreakpointBody {
    #[serde(rename = "Breakpoint", alias = "breakpoint")]
    pub breakpoint: RpcBreakpoint,
}

/// Body of Eval responses
#[derive(Debug, Clone, Deserialize)]
pub struct VariableBody {
    #[serde(rename = "Variable", alias = "variable", default)]
    pub variable: Option<Variable>,
}
