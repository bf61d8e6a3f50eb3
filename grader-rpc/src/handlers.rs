// Engine Handler
// The engine's two public operations, packaged for a host server

use crate::error::{RpcError, RpcResult};

use grader_engine::sandbox::SandboxRunner;
use grader_engine::task::{Task, TaskVerdict, VerdictSink};
use grader_engine::{ExecutorConfig, TaskDefinition, UserInput};

use std::sync::Arc;

/// Host-facing facade over the engine: "check definition D" and "evaluate
/// task T with inputs I". Verdicts are forwarded to the result sink when one
/// is attached.
pub struct EngineHandler {
    sandbox: Arc<dyn SandboxRunner>,
    sink: Option<Arc<dyn VerdictSink>>,
    config: ExecutorConfig,
}

impl EngineHandler {
    pub fn new(sandbox: Arc<dyn SandboxRunner>) -> Self {
        Self {
            sandbox,
            sink: None,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn VerdictSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Parse and structurally validate a task definition. Returns the number
    /// of validated testcase graphs.
    pub fn check(&self, definition_json: &str) -> RpcResult<usize> {
        let definition: TaskDefinition = serde_json::from_str(definition_json)?;
        let graphs = Task::new(definition).check()?;
        Ok(graphs.len())
    }

    /// Evaluate a submission against a task and hand the verdict to the
    /// caller (and the sink, if attached).
    pub async fn evaluate(
        &self,
        definition: TaskDefinition,
        user_inputs: Vec<UserInput>,
    ) -> RpcResult<TaskVerdict> {
        let task = Task::new(definition);
        let verdict = task
            .evaluate(&user_inputs, self.sandbox.clone(), self.config.clone())
            .await?;

        if let Some(sink) = &self.sink {
            sink.publish(verdict.clone())
                .await
                .map_err(|err| RpcError::InternalError(err.to_string()))?;
        }

        Ok(verdict)
    }
}
