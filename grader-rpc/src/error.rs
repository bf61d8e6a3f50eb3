// RPC Error Types
// Maps engine errors onto the host-facing surface

use grader_engine::EngineError;

use std::fmt;

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug)]
pub enum RpcError {
    /// The task definition is malformed or ill-typed.
    InvalidDefinition(String),
    /// The submission itself is unusable (e.g. a required input is missing).
    InvalidRequest(String),
    /// The sandbox collaborator is unreachable; not the submitter's fault.
    EngineUnavailable(String),
    InternalError(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::InvalidDefinition(msg) => write!(f, "Invalid definition: {}", msg),
            RpcError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            RpcError::EngineUnavailable(msg) => write!(f, "Engine unavailable: {}", msg),
            RpcError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<EngineError> for RpcError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(validation) => {
                RpcError::InvalidDefinition(validation.to_string())
            }
            EngineError::MissingRequiredInput(_) => RpcError::InvalidRequest(err.to_string()),
            EngineError::CollaboratorUnavailable(msg) => RpcError::EngineUnavailable(msg),
            EngineError::Internal(msg) => RpcError::InternalError(msg),
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::InvalidDefinition(err.to_string())
    }
}
