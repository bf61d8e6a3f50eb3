// INPUT Executor
// Supplies literal and caller-provided values as outputs

use crate::definition::{NodeDefinition, SocketRef};
use crate::error::{ExecutionFailure, FailureKind};
use crate::executors::{BoundInputs, ExecutorError, NodeExecutor, NodeOutputs};
use crate::value::Value;

use std::collections::BTreeMap;

/// Caller-supplied seed values for INPUT sockets that carry no literal.
#[derive(Debug, Clone, Default)]
pub struct InputBindings {
    values: BTreeMap<SocketRef, Value>,
}

impl InputBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, socket: SocketRef, value: Value) -> Self {
        self.values.insert(socket, value);
        self
    }

    pub fn set(&mut self, socket: SocketRef, value: Value) {
        self.values.insert(socket, value);
    }

    pub fn get(&self, socket: &SocketRef) -> Option<&Value> {
        self.values.get(socket)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Emits one value per declared output socket: the socket's literal, or the
/// caller-supplied binding for required (literal-less) sockets.
pub struct InputExecutor {
    bindings: InputBindings,
}

impl InputExecutor {
    pub fn new(bindings: InputBindings) -> Self {
        Self { bindings }
    }
}

#[async_trait::async_trait]
impl NodeExecutor for InputExecutor {
    async fn execute(
        &self,
        node: &NodeDefinition,
        _inputs: &BoundInputs,
    ) -> Result<NodeOutputs, ExecutorError> {
        let mut outputs = Vec::with_capacity(node.outputs.len());

        for socket in &node.outputs {
            let socket_ref = SocketRef::new(node.id, socket.id.clone());
            let value = match (&socket.data, self.bindings.get(&socket_ref)) {
                (Some(literal), _) => literal.clone(),
                (None, Some(bound)) => bound.clone(),
                (None, None) => {
                    return Err(ExecutionFailure::new(
                        FailureKind::RuntimeError,
                        node.id,
                        format!("no literal or binding supplied for socket {}", socket_ref),
                    )
                    .into());
                }
            };

            if !socket.ty.admits(&value) {
                return Err(ExecutionFailure::type_mismatch(
                    node.id,
                    format!(
                        "socket {} declares {} but was seeded with {}",
                        socket_ref,
                        socket.ty,
                        value.socket_type()
                    ),
                )
                .into());
            }

            outputs.push((socket.id.clone(), value));
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{NodeConfig, SocketDefinition};
    use crate::value::SocketType;

    fn input_node(sockets: Vec<SocketDefinition>) -> NodeDefinition {
        NodeDefinition {
            id: 1,
            inputs: Vec::new(),
            outputs: sockets,
            config: NodeConfig::Input,
        }
    }

    #[tokio::test]
    async fn test_literals_are_emitted() {
        let node = input_node(vec![
            SocketDefinition::new("m", SocketType::Integer).with_data(Value::Int(2)),
            SocketDefinition::new("c", SocketType::Integer).with_data(Value::Int(1)),
        ]);

        let executor = InputExecutor::new(InputBindings::new());
        let outputs = executor.execute(&node, &BoundInputs::new()).await.unwrap();
        assert_eq!(
            outputs,
            vec![
                ("m".to_string(), Value::Int(2)),
                ("c".to_string(), Value::Int(1)),
            ]
        );
    }

    #[tokio::test]
    async fn test_caller_binding_fills_required_socket() {
        let node = input_node(vec![SocketDefinition::new("solution", SocketType::String)]);

        let bindings = InputBindings::new().bind(
            SocketRef::new(1, "solution"),
            Value::Str("print(1)".to_string()),
        );
        let executor = InputExecutor::new(bindings);
        let outputs = executor.execute(&node, &BoundInputs::new()).await.unwrap();
        assert_eq!(
            outputs,
            vec![("solution".to_string(), Value::Str("print(1)".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_missing_binding_fails() {
        let node = input_node(vec![SocketDefinition::new("solution", SocketType::String)]);

        let executor = InputExecutor::new(InputBindings::new());
        let err = executor
            .execute(&node, &BoundInputs::new())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::RuntimeError)
            }
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ill_typed_binding_fails() {
        let node = input_node(vec![SocketDefinition::new("n", SocketType::Integer)]);

        let bindings =
            InputBindings::new().bind(SocketRef::new(1, "n"), Value::Str("two".to_string()));
        let executor = InputExecutor::new(bindings);
        let err = executor
            .execute(&node, &BoundInputs::new())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::TypeMismatch)
            }
            other => panic!("wrong error: {:?}", other),
        }
    }
}
