// Execution Events
// Progress reporting for one graph execution

use crate::definition::{NodeId, NodeKind};
use crate::error::FailureKind;

use tokio::sync::mpsc;

use std::time::Duration;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while a graph executes
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Graph execution started
    GraphStarted { total_nodes: usize },

    /// Graph execution completed
    GraphCompleted { passed: bool, duration: Duration },

    /// Node execution started
    NodeStarted { node_id: NodeId, kind: NodeKind },

    /// Node execution completed
    NodeCompleted { node_id: NodeId, duration: Duration },

    /// Node was skipped (an input socket resolved to Unbound)
    NodeSkipped { node_id: NodeId, reason: String },

    /// Node raised a grading failure
    NodeFailed {
        node_id: NodeId,
        kind: FailureKind,
        message: String,
    },

    /// An IF_ELSE condition was realized and a branch chosen
    BranchEvaluated { node_id: NodeId, condition: bool },

    /// A LOOP body iteration started
    LoopIterationStarted { node_id: NodeId, iteration: u32 },

    /// A LOOP terminated normally
    LoopCompleted { node_id: NodeId, iterations: u32 },
}

impl ExecutionEvent {
    pub fn node_started(node_id: NodeId, kind: NodeKind) -> Self {
        Self::NodeStarted { node_id, kind }
    }

    pub fn node_completed(node_id: NodeId, duration: Duration) -> Self {
        Self::NodeCompleted { node_id, duration }
    }

    pub fn node_skipped(node_id: NodeId, reason: impl Into<String>) -> Self {
        Self::NodeSkipped {
            node_id,
            reason: reason.into(),
        }
    }

    pub fn node_failed(node_id: NodeId, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::NodeFailed {
            node_id,
            kind,
            message: message.into(),
        }
    }
}

/// Fire-and-forget event emission; a missing or closed receiver never
/// disturbs execution.
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(ExecutionEvent::GraphStarted { total_nodes: 3 });
        tx.send_event(ExecutionEvent::node_started(1, NodeKind::Input));

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, ExecutionEvent::GraphStarted { total_nodes: 3 }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            ExecutionEvent::NodeStarted {
                node_id: 1,
                kind: NodeKind::Input
            }
        ));
    }

    #[test]
    fn test_missing_receiver_is_harmless() {
        let sender: Option<ProgressSender> = None;
        sender.send_event(ExecutionEvent::node_skipped(2, "unbound input"));
    }
}
