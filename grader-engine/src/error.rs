// Engine Error Taxonomy
// Grading failures terminate one execution; infrastructure faults surface to the caller

use crate::definition::NodeId;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a grading failure.
///
/// Every kind terminates the current graph execution and surfaces as a fail
/// verdict referencing the failing node. None of them are retried by the
/// engine; retry policy belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The sandbox exceeded its time limit, or the supervisory deadline
    /// cancelled a pending sandbox call.
    Timeout,
    /// The sandbox reported a memory or other resource limit breach.
    ResourceExceeded,
    /// The submitted code raised at runtime.
    RuntimeError,
    /// A value of the wrong type reached an executor despite validation.
    TypeMismatch,
    /// A terminal OUTPUT socket resolved to Unbound.
    UnboundOutput,
    /// A LOOP region hit its configured maximum-iteration bound.
    LoopBoundExceeded,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::ResourceExceeded => "RESOURCE_EXCEEDED",
            FailureKind::RuntimeError => "RUNTIME_ERROR",
            FailureKind::TypeMismatch => "TYPE_MISMATCH",
            FailureKind::UnboundOutput => "UNBOUND_OUTPUT",
            FailureKind::LoopBoundExceeded => "LOOP_BOUND_EXCEEDED",
        }
    }
}

/// A grading failure raised by a node executor or the engine itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    /// The node the failure is attributed to. `None` only for failures that
    /// cannot be pinned on a single node (the overall deadline).
    pub node_id: Option<NodeId>,
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(kind: FailureKind, node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_id: Some(node_id),
            message: message.into(),
        }
    }

    pub fn unattributed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_id: None,
            message: message.into(),
        }
    }

    pub fn timeout(node_id: NodeId, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, node_id, message)
    }

    pub fn type_mismatch(node_id: NodeId, message: impl Into<String>) -> Self {
        Self::new(FailureKind::TypeMismatch, node_id, message)
    }

    pub fn runtime(node_id: NodeId, message: impl Into<String>) -> Self {
        Self::new(FailureKind::RuntimeError, node_id, message)
    }
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(node_id) = self.node_id {
            write!(f, " at node {}", node_id)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ExecutionFailure {}

/// Faults surfaced to the caller instead of being folded into a verdict.
///
/// A `CollaboratorUnavailable` is an infrastructure problem, never the
/// submitter's fault; callers must not record it as a grading result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sandbox collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error(transparent)]
    Validation(#[from] crate::definition::ValidationError),

    #[error("required input '{0}' not provided")]
    MissingRequiredInput(String),

    #[error("internal engine error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_carries_kind_and_node() {
        let failure = ExecutionFailure::timeout(7, "sandbox exceeded 5s limit");
        let text = failure.to_string();
        assert!(text.contains("TIMEOUT"));
        assert!(text.contains("node 7"));
    }

    #[test]
    fn test_failure_kind_wire_names() {
        let json = serde_json::to_string(&FailureKind::LoopBoundExceeded).unwrap();
        assert_eq!(json, "\"LOOP_BOUND_EXCEEDED\"");
    }
}
