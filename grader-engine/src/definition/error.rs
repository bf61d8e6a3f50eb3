// Validation Errors
// Structural and type errors raised while checking a task definition

use crate::definition::{EdgeId, NodeId};

use std::fmt;

/// Error raised by graph validation.
///
/// Validation fails fast: the first violated invariant is reported with the
/// offending node/edge id and nothing is partially applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub kind: ValidationErrorKind,
    pub node_id: Option<NodeId>,
    pub edge_id: Option<EdgeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// An id appears twice, or an edge references an unknown node/socket
    UnknownReference,
    /// Duplicate node id or duplicate socket id within a node
    DuplicateId,
    /// Edge endpoints point at the wrong socket direction
    DirectionMismatch,
    /// An IN socket is fed by more than one edge, or by none
    SocketFeed,
    /// Edge endpoint types are incompatible and no coercion is declared
    IncompatibleTypes,
    /// The non-loop subgraph contains a cycle
    CyclicDependency,
    /// A node is unreachable from INPUT or cannot reach OUTPUT
    Unreachable,
    /// Kind-specific configuration is malformed
    InvalidConfig,
    /// A control-flow region is ill-formed
    InvalidRegion,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            node_id: None,
            edge_id: None,
        }
    }

    pub fn for_node(kind: ValidationErrorKind, node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            node_id: Some(node_id),
            edge_id: None,
        }
    }

    pub fn for_edge(kind: ValidationErrorKind, edge_id: EdgeId, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            node_id: None,
            edge_id: Some(edge_id),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error: {}", self.message)?;
        if let Some(node_id) = self.node_id {
            write!(f, " (node {})", node_id)?;
        }
        if let Some(edge_id) = self.edge_id {
            write!(f, " (edge {})", edge_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
