// RUN_FUNCTION Executor
// Delegates submitted code to the sandbox collaborator under resource limits

use crate::definition::{
    NodeConfig, NodeDefinition, ARG_SOCKET_PREFIX, FILE_SOCKET, KWARG_SOCKET_PREFIX,
};
use crate::error::{ExecutionFailure, FailureKind};
use crate::executors::{BoundInputs, ExecutorError, NodeExecutor, NodeOutputs};
use crate::sandbox::{
    ResourceLimit, RunnerEnvironment, SandboxOutcome, SandboxRequest, SandboxRunner,
};
use crate::value::Value;

use tracing::debug;
use uuid::Uuid;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// The sole executor that leaves the process: submits the bound module and
/// arguments to the sandbox and blocks until a structured result arrives or
/// the supervisory deadline elapses.
pub struct RunFunctionExecutor {
    sandbox: Arc<dyn SandboxRunner>,
    environment: RunnerEnvironment,
    /// Headroom granted on top of the node's time limit before the engine
    /// cancels the pending call; covers queueing and transport latency.
    grace: Duration,
}

impl RunFunctionExecutor {
    pub fn new(
        sandbox: Arc<dyn SandboxRunner>,
        environment: RunnerEnvironment,
        grace: Duration,
    ) -> Self {
        Self {
            sandbox,
            environment,
            grace,
        }
    }

    fn build_request(
        &self,
        node: &NodeDefinition,
        inputs: &BoundInputs,
        function_name: &str,
        environment: RunnerEnvironment,
    ) -> Result<SandboxRequest, ExecutionFailure> {
        let file = inputs
            .require(node.id, FILE_SOCKET)?
            .as_file()
            .ok_or_else(|| {
                ExecutionFailure::type_mismatch(
                    node.id,
                    format!("socket '{}' is not bound to a file artifact", FILE_SOCKET),
                )
            })?
            .clone();

        // Positional arguments in socket declaration order, keywords by name.
        let mut args: Vec<Value> = Vec::new();
        let mut kwargs: BTreeMap<String, Value> = BTreeMap::new();
        for socket in &node.inputs {
            if socket.id == FILE_SOCKET {
                continue;
            }
            let value = inputs.require(node.id, &socket.id)?.clone();
            if let Some(name) = socket.id.strip_prefix(KWARG_SOCKET_PREFIX) {
                kwargs.insert(name.to_string(), value);
            } else if socket.id.starts_with(ARG_SOCKET_PREFIX) {
                args.push(value);
            }
        }

        Ok(SandboxRequest {
            submission_id: Uuid::new_v4(),
            file,
            function_name: function_name.to_string(),
            args,
            kwargs,
            environment,
        })
    }
}

#[async_trait::async_trait]
impl NodeExecutor for RunFunctionExecutor {
    async fn execute(
        &self,
        node: &NodeDefinition,
        inputs: &BoundInputs,
    ) -> Result<NodeOutputs, ExecutorError> {
        let NodeConfig::RunFunction {
            function_name,
            time_limit_secs,
            memory_limit_mb,
        } = &node.config
        else {
            return Err(ExecutionFailure::runtime(
                node.id,
                "node routed to RUN_FUNCTION executor without a RUN_FUNCTION config",
            )
            .into());
        };

        let environment = self
            .environment
            .clone()
            .with_limits(*time_limit_secs, *memory_limit_mb);
        let time_limit = Duration::from_secs(environment.time_limit_secs);
        let request = self.build_request(node, inputs, function_name, environment)?;

        let return_socket = node
            .outputs
            .first()
            .map(|s| s.id.clone())
            .ok_or_else(|| {
                ExecutionFailure::runtime(node.id, "RUN_FUNCTION node has no return socket")
            })?;

        debug!(
            node_id = node.id,
            submission_id = %request.submission_id,
            function = %request.function_name,
            "dispatching to sandbox"
        );

        let outcome = match tokio::time::timeout(time_limit + self.grace, self.sandbox.run(request))
            .await
        {
            // Deadline elapsed: the pending call is cancelled by dropping it.
            Err(_) => {
                return Err(ExecutionFailure::timeout(
                    node.id,
                    format!("sandbox call exceeded the {}s time limit", time_limit.as_secs()),
                )
                .into());
            }
            Ok(Err(unavailable)) => return Err(unavailable.into()),
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            SandboxOutcome::Return { value } => Ok(vec![(return_socket, value)]),
            SandboxOutcome::RuntimeError { message } => {
                Err(ExecutionFailure::runtime(node.id, message).into())
            }
            SandboxOutcome::LimitExceeded { limit } => {
                let failure = match limit {
                    ResourceLimit::Time => ExecutionFailure::timeout(
                        node.id,
                        "sandbox reported the time limit exceeded",
                    ),
                    ResourceLimit::Memory => ExecutionFailure::new(
                        FailureKind::ResourceExceeded,
                        node.id,
                        "sandbox reported the memory limit exceeded",
                    ),
                };
                Err(failure.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::SocketDefinition;
    use crate::sandbox::SandboxUnavailable;
    use crate::value::{FileArtifact, SocketType};

    use tokio::sync::Mutex;

    fn run_function_node() -> NodeDefinition {
        NodeDefinition {
            id: 3,
            inputs: vec![
                SocketDefinition::new(FILE_SOCKET, SocketType::File),
                SocketDefinition::new("arg0", SocketType::Integer),
                SocketDefinition::new("arg1", SocketType::Integer),
                SocketDefinition::new("kwarg.verbose", SocketType::Boolean),
            ],
            outputs: vec![SocketDefinition::new("result", SocketType::Any)],
            config: NodeConfig::RunFunction {
                function_name: "search".to_string(),
                time_limit_secs: Some(5),
                memory_limit_mb: None,
            },
        }
    }

    fn bound_inputs() -> BoundInputs {
        let mut inputs = BoundInputs::new();
        inputs.insert(
            FILE_SOCKET,
            Value::File(FileArtifact {
                file_name: "solution.py".to_string(),
                content: "def search(m, c): ...".to_string(),
            }),
        );
        inputs.insert("arg0", Value::Int(2));
        inputs.insert("arg1", Value::Int(1));
        inputs.insert("kwarg.verbose", Value::Bool(false));
        inputs
    }

    /// Records the request and replies with a canned outcome.
    struct StubSandbox {
        outcome: SandboxOutcome,
        seen: Mutex<Vec<SandboxRequest>>,
    }

    impl StubSandbox {
        fn returning(outcome: SandboxOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl SandboxRunner for StubSandbox {
        async fn run(&self, request: SandboxRequest) -> Result<SandboxOutcome, SandboxUnavailable> {
            self.seen.lock().await.push(request);
            Ok(self.outcome.clone())
        }
    }

    /// Never answers; used to exercise the supervisory deadline.
    struct HangingSandbox;

    #[async_trait::async_trait]
    impl SandboxRunner for HangingSandbox {
        async fn run(&self, _request: SandboxRequest) -> Result<SandboxOutcome, SandboxUnavailable> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(SandboxOutcome::Return { value: Value::Null })
        }
    }

    fn executor(sandbox: Arc<dyn SandboxRunner>) -> RunFunctionExecutor {
        RunFunctionExecutor::new(
            sandbox,
            RunnerEnvironment::python(10, 256),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_request_carries_ordered_args_and_limits() {
        let sandbox = StubSandbox::returning(SandboxOutcome::Return {
            value: Value::Str("((2, 0), (1, 0), (1, 1))".to_string()),
        });
        let outputs = executor(sandbox.clone())
            .execute(&run_function_node(), &bound_inputs())
            .await
            .unwrap();

        assert_eq!(
            outputs,
            vec![(
                "result".to_string(),
                Value::Str("((2, 0), (1, 0), (1, 1))".to_string())
            )]
        );

        let seen = sandbox.seen.lock().await;
        let request = &seen[0];
        assert_eq!(request.function_name, "search");
        assert_eq!(request.args, vec![Value::Int(2), Value::Int(1)]);
        assert_eq!(request.kwargs.get("verbose"), Some(&Value::Bool(false)));
        // The node overrides the environment's time limit but not memory.
        assert_eq!(request.environment.time_limit_secs, 5);
        assert_eq!(request.environment.memory_limit_mb, 256);
    }

    #[tokio::test]
    async fn test_sandbox_error_becomes_runtime_failure() {
        let sandbox = StubSandbox::returning(SandboxOutcome::RuntimeError {
            message: "ZeroDivisionError: division by zero".to_string(),
        });
        let err = executor(sandbox)
            .execute(&run_function_node(), &bound_inputs())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::RuntimeError);
                assert_eq!(failure.node_id, Some(3));
                assert!(failure.message.contains("ZeroDivisionError"));
            }
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_limit_descriptor_maps_to_resource_exceeded() {
        let sandbox = StubSandbox::returning(SandboxOutcome::LimitExceeded {
            limit: ResourceLimit::Memory,
        });
        let err = executor(sandbox)
            .execute(&run_function_node(), &bound_inputs())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::ResourceExceeded)
            }
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisory_deadline_yields_timeout_not_a_hang() {
        let err = executor(Arc::new(HangingSandbox))
            .execute(&run_function_node(), &bound_inputs())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::Timeout);
                assert_eq!(failure.node_id, Some(3));
            }
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_collaborator_is_not_a_grading_failure() {
        struct DownSandbox;

        #[async_trait::async_trait]
        impl SandboxRunner for DownSandbox {
            async fn run(
                &self,
                _request: SandboxRequest,
            ) -> Result<SandboxOutcome, SandboxUnavailable> {
                Err(SandboxUnavailable::new("queue connection refused"))
            }
        }

        let err = executor(Arc::new(DownSandbox))
            .execute(&run_function_node(), &bound_inputs())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Unavailable(_)));
    }
}
