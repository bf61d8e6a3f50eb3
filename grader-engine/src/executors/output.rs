// OUTPUT Executor
// Terminal node: forwards bound inputs into the verdict payload

use crate::definition::NodeDefinition;
use crate::executors::{BoundInputs, ExecutorError, NodeExecutor, NodeOutputs};
use crate::value::SocketType;
use crate::verdict::OutputRecord;

/// OUTPUT nodes produce no downstream values; their bound inputs become the
/// verdict's result payload, each marked with its declared visibility. The
/// engine rejects an unbound OUTPUT socket before this executor runs.
pub struct OutputExecutor;

impl OutputExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the payload records of an OUTPUT node. BOOLEAN-typed sockets
    /// are assertions the result evaluator aggregates into pass/fail.
    pub fn collect_records(node: &NodeDefinition, inputs: &BoundInputs) -> Vec<OutputRecord> {
        node.inputs
            .iter()
            .filter_map(|socket| {
                let value = inputs.get(&socket.id)?.clone();
                Some(OutputRecord {
                    node_id: node.id,
                    socket_id: socket.id.clone(),
                    assertion: socket.ty == SocketType::Boolean,
                    visibility: socket.visibility,
                    value,
                })
            })
            .collect()
    }
}

impl Default for OutputExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NodeExecutor for OutputExecutor {
    async fn execute(
        &self,
        _node: &NodeDefinition,
        _inputs: &BoundInputs,
    ) -> Result<NodeOutputs, ExecutorError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{NodeConfig, SocketDefinition, Visibility};
    use crate::value::Value;

    #[test]
    fn test_records_carry_visibility_and_assertion_flags() {
        let node = NodeDefinition {
            id: 4,
            inputs: vec![
                SocketDefinition::new("ok", SocketType::Boolean).public(),
                SocketDefinition::new("detail", SocketType::String),
            ],
            outputs: Vec::new(),
            config: NodeConfig::Output,
        };

        let mut inputs = BoundInputs::new();
        inputs.insert("ok", Value::Bool(true));
        inputs.insert("detail", Value::Str("matched".to_string()));

        let records = OutputExecutor::collect_records(&node, &inputs);
        assert_eq!(records.len(), 2);

        assert!(records[0].assertion);
        assert_eq!(records[0].visibility, Visibility::Public);
        assert_eq!(records[0].value, Value::Bool(true));

        assert!(!records[1].assertion);
        assert_eq!(records[1].visibility, Visibility::Private);
    }
}
