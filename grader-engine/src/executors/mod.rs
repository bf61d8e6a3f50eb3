// Node Executors
// One executor per node kind, behind a registry the engine routes through

pub mod compare;
pub mod input;
pub mod output;
pub mod run_function;

pub use compare::{CompareExecutor, StringMatchExecutor};
pub use input::{InputBindings, InputExecutor};
pub use output::OutputExecutor;
pub use run_function::RunFunctionExecutor;

use crate::definition::{NodeDefinition, NodeId, NodeKind};
use crate::error::{ExecutionFailure, FailureKind};
use crate::sandbox::{RunnerEnvironment, SandboxRunner, SandboxUnavailable};
use crate::value::Value;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Inputs realized for one node, keyed by socket id.
#[derive(Debug, Clone, Default)]
pub struct BoundInputs {
    values: BTreeMap<String, Value>,
}

impl BoundInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, socket_id: impl Into<String>, value: Value) {
        self.values.insert(socket_id.into(), value);
    }

    pub fn get(&self, socket_id: &str) -> Option<&Value> {
        self.values.get(socket_id)
    }

    /// Fetch an input the engine has promised to bind before executing.
    pub fn require(&self, node_id: NodeId, socket_id: &str) -> Result<&Value, ExecutionFailure> {
        self.get(socket_id).ok_or_else(|| {
            ExecutionFailure::new(
                FailureKind::TypeMismatch,
                node_id,
                format!("input socket '{}' is unbound", socket_id),
            )
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Values produced by one node, keyed by socket id.
pub type NodeOutputs = Vec<(String, Value)>;

/// Error surface of a node executor.
///
/// Grading failures become a fail verdict; an unavailable collaborator aborts
/// the execution as an infrastructure fault instead.
#[derive(Debug)]
pub enum ExecutorError {
    Failure(ExecutionFailure),
    Unavailable(SandboxUnavailable),
}

impl From<ExecutionFailure> for ExecutorError {
    fn from(failure: ExecutionFailure) -> Self {
        ExecutorError::Failure(failure)
    }
}

impl From<SandboxUnavailable> for ExecutorError {
    fn from(err: SandboxUnavailable) -> Self {
        ExecutorError::Unavailable(err)
    }
}

/// Per-kind node semantics.
///
/// Executors are pure functions of the node and its bound inputs; the only
/// exception is RUN_FUNCTION, which suspends on the sandbox collaborator.
#[async_trait::async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        node: &NodeDefinition,
        inputs: &BoundInputs,
    ) -> Result<NodeOutputs, ExecutorError>;
}

/// Routes each node kind to its executor.
pub struct ExecutorRegistry {
    input: InputExecutor,
    output: OutputExecutor,
    string_match: StringMatchExecutor,
    compare: CompareExecutor,
    run_function: RunFunctionExecutor,
}

impl ExecutorRegistry {
    pub fn new(
        bindings: InputBindings,
        sandbox: Arc<dyn SandboxRunner>,
        environment: RunnerEnvironment,
        sandbox_grace: Duration,
    ) -> Self {
        Self {
            input: InputExecutor::new(bindings),
            output: OutputExecutor::new(),
            string_match: StringMatchExecutor::new(),
            compare: CompareExecutor::new(),
            run_function: RunFunctionExecutor::new(sandbox, environment, sandbox_grace),
        }
    }

    /// Control-flow kinds have no executor; the engine interprets them
    /// directly from the plan.
    pub fn for_kind(&self, kind: NodeKind) -> Option<&dyn NodeExecutor> {
        match kind {
            NodeKind::Input => Some(&self.input),
            NodeKind::Output => Some(&self.output),
            NodeKind::StringMatch => Some(&self.string_match),
            NodeKind::Compare => Some(&self.compare),
            NodeKind::RunFunction => Some(&self.run_function),
            NodeKind::IfElse | NodeKind::Loop => None,
        }
    }
}
