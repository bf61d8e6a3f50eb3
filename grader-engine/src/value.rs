// Runtime Values and Socket Types
// The typed currency of the socket data bus

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;

/// A code artifact carried through the graph: the submitted module a
/// RUN_FUNCTION node invokes, or any auxiliary file a test case ships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileArtifact {
    pub file_name: String,
    pub content: String,
}

/// A runtime value bound to a socket.
///
/// Integers and floats are distinct variants so the INTEGER -> FLOAT widening
/// rule can be checked at validation time instead of silently at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    File(FileArtifact),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::File(_) => true,
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileArtifact> {
        match self {
            Value::File(f) => Some(f),
            _ => None,
        }
    }

    /// Stringified form used by STRING_MATCH and the public result payload.
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => {
                if n.fract() == 0.0 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Str(s) => s.clone(),
            Value::File(f) => f.file_name.clone(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// The socket type this value inhabits.
    pub fn socket_type(&self) -> SocketType {
        match self {
            Value::Null => SocketType::Any,
            Value::Bool(_) => SocketType::Boolean,
            Value::Int(_) => SocketType::Integer,
            Value::Float(_) => SocketType::Float,
            Value::Str(_) => SocketType::String,
            Value::File(_) => SocketType::File,
            Value::Array(_) | Value::Object(_) => SocketType::Any,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// Declared type of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketType {
    Boolean,
    Integer,
    Float,
    String,
    File,
    /// Untyped; compatible with everything. The return socket of a
    /// RUN_FUNCTION node is ANY because the sandbox can hand back anything.
    #[default]
    Any,
}

impl SocketType {
    /// Whether a value of type `from` may flow into a socket of type `self`
    /// without a declared coercion. Exact match, ANY on either end, or the
    /// built-in INTEGER -> FLOAT widening.
    pub fn accepts(self, from: SocketType) -> bool {
        if self == from || self == SocketType::Any || from == SocketType::Any {
            return true;
        }
        matches!((from, self), (SocketType::Integer, SocketType::Float))
    }

    /// Whether a bound runtime value satisfies this declared type.
    pub fn admits(self, value: &Value) -> bool {
        self.accepts(value.socket_type())
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketType::Boolean => "BOOLEAN",
            SocketType::Integer => "INTEGER",
            SocketType::Float => "FLOAT",
            SocketType::String => "STRING",
            SocketType::File => "FILE",
            SocketType::Any => "ANY",
        };
        write!(f, "{}", name)
    }
}

/// A coercion declared on an edge, applied to the value as it crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeCoercion {
    IntToFloat,
    ToString,
}

impl EdgeCoercion {
    /// The socket type produced by applying this coercion to `from`, or None
    /// if the coercion does not apply to that type.
    pub fn output_type(self, from: SocketType) -> Option<SocketType> {
        match self {
            EdgeCoercion::IntToFloat => {
                matches!(from, SocketType::Integer | SocketType::Any).then_some(SocketType::Float)
            }
            // Everything stringifies.
            EdgeCoercion::ToString => Some(SocketType::String),
        }
    }

    /// Apply the coercion to a runtime value.
    pub fn apply(self, value: &Value) -> Value {
        match self {
            EdgeCoercion::IntToFloat => match value {
                Value::Int(n) => Value::Float(*n as f64),
                other => other.clone(),
            },
            EdgeCoercion::ToString => Value::Str(value.as_string()),
        }
    }
}
