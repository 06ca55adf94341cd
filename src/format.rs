//! Rendering of evaluated variables
//!
//! Turns the value tree delve returns for an expression into a single
//! display line, e.g. `{name:"gopher", tags:["a", "b"]}`.

use crate::rpc::{Kind, Variable};

/// Rendered for a missing or invalid value
pub const UNDEFINED: &str = "undefined";

/// Format an optional variable; `None` renders as `undefined`
pub fn format_variable(variable: Option<&Variable>) -> String {
    match variable {
        Some(v) => format(v),
        None => UNDEFINED.to_string(),
    }
}

/// Format a variable tree
pub fn format(v: &Variable) -> String {
    match v.kind {
        Kind::Invalid => UNDEFINED.to_string(),

        Kind::Bool
        | Kind::Int
        | Kind::Int8
        | Kind::Int16
        | Kind::Int32
        | Kind::Int64
        | Kind::Uint
        | Kind::Uint8
        | Kind::Uint16
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Uintptr
        | Kind::Float32
        | Kind::Float64
        | Kind::Complex64
        | Kind::Complex128
        | Kind::Func
        | Kind::UnsafePointer => v.value.clone(),

        Kind::String => format!("\"{}\"", v.value),

        // Only the first key/value pair is shown
        Kind::Map => match (v.children.first(), v.children.get(1)) {
            (Some(key), value) => format!("[{}: {}]", format(key), format_variable(value)),
            (None, _) => "[]".to_string(),
        },

        Kind::Array | Kind::Slice => {
            let elems: Vec<String> = v.children.iter().map(format).collect();
            format!("[{}]", elems.join(", "))
        }

        Kind::Interface => format_variable(v.children.first()),

        Kind::Ptr => match v.children.first() {
            Some(pointee) => format(pointee),
            None => type_name(v).to_string(),
        },

        Kind::Struct => {
            let fields: Vec<String> = v
                .children
                .iter()
                .map(|field| format!("{}:{}", field.name, format(field)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }

        Kind::Chan => type_name(v).to_string(),
    }
}

fn type_name(v: &Variable) -> &str {
    if v.real_type.is_empty() {
        &v.declared_type
    } else {
        &v.real_type
    }
}
