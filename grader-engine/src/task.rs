// Task Orchestration
// One graded problem: user-input attachment and parallel testcase evaluation

use crate::definition::{
    NodeConfig, NodeDefinition, SocketDefinition, TaskDefinition, TestcaseDefinition, UserInput,
    Visibility, USER_INPUT_NODE_ID,
};
use crate::error::EngineError;
use crate::execution::{ExecutorConfig, GraphExecutor};
use crate::executors::InputBindings;
use crate::graph::Graph;
use crate::sandbox::{SandboxRunner, SubmissionId};
use crate::verdict::{PublicVerdict, Verdict};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use std::sync::Arc;

/// Result of evaluating one submission against a whole task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskVerdict {
    pub task_id: i64,
    pub submission_id: SubmissionId,
    /// The task passes iff every testcase passes.
    pub passed: bool,
    pub testcases: Vec<TestcaseVerdict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestcaseVerdict {
    pub testcase_id: i64,
    pub verdict: Verdict,
}

impl TaskVerdict {
    /// Submitter-facing views, one per testcase, in task order.
    pub fn public_views(&self) -> Vec<(i64, PublicVerdict)> {
        self.testcases
            .iter()
            .map(|t| (t.testcase_id, t.verdict.public_view()))
            .collect()
    }
}

/// The result-sink collaborator could not accept the verdict.
#[derive(Debug, Clone, Error)]
#[error("verdict sink unavailable: {message}")]
pub struct SinkClosed {
    pub message: String,
}

impl SinkClosed {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives emitted verdicts for persistence/display; the engine itself
/// never persists.
#[async_trait::async_trait]
pub trait VerdictSink: Send + Sync {
    async fn publish(&self, verdict: TaskVerdict) -> Result<(), SinkClosed>;
}

/// A graded problem bound to its definition.
pub struct Task {
    definition: TaskDefinition,
}

impl Task {
    pub fn new(definition: TaskDefinition) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    /// Build the synthetic INPUT node (reserved id 0) carrying the submitted
    /// required inputs, typed per the task's declarations.
    fn user_input_node(&self, user_inputs: &[UserInput]) -> Result<NodeDefinition, EngineError> {
        let mut outputs = Vec::with_capacity(self.definition.required_inputs.len());
        for required in &self.definition.required_inputs {
            let supplied = user_inputs
                .iter()
                .find(|input| input.id == required.id)
                .ok_or_else(|| EngineError::MissingRequiredInput(required.id.clone()))?;
            outputs.push(SocketDefinition {
                id: required.id.clone(),
                ty: required.ty,
                data: Some(supplied.data.clone()),
                visibility: Visibility::Private,
            });
        }
        Ok(NodeDefinition {
            id: USER_INPUT_NODE_ID,
            inputs: Vec::new(),
            outputs,
            config: NodeConfig::Input,
        })
    }

    fn attach(&self, testcase: &TestcaseDefinition, user_node: &NodeDefinition) -> TestcaseDefinition {
        let mut attached = testcase.clone();
        // A task with no required inputs has no user-input node to add.
        if !user_node.outputs.is_empty() {
            attached.nodes.insert(0, user_node.clone());
        }
        attached
    }

    /// Authoring-time check: validate every testcase graph against the
    /// declared required inputs, without a submission. Required sockets are
    /// attached unfilled; only their declared types participate.
    pub fn check(&self) -> Result<Vec<Graph>, EngineError> {
        let placeholder = NodeDefinition {
            id: USER_INPUT_NODE_ID,
            inputs: Vec::new(),
            outputs: self
                .definition
                .required_inputs
                .iter()
                .map(|required| SocketDefinition::new(required.id.clone(), required.ty))
                .collect(),
            config: NodeConfig::Input,
        };
        self.definition
            .testcases
            .iter()
            .map(|testcase| {
                Graph::from_definition(&self.attach(testcase, &placeholder))
                    .map_err(EngineError::from)
            })
            .collect()
    }

    /// Check the submission against every testcase graph. Missing required
    /// inputs and structural errors are rejected before any execution.
    pub fn validate(&self, user_inputs: &[UserInput]) -> Result<Vec<Graph>, EngineError> {
        let user_node = self.user_input_node(user_inputs)?;
        self.definition
            .testcases
            .iter()
            .map(|testcase| {
                Graph::from_definition(&self.attach(testcase, &user_node))
                    .map_err(EngineError::from)
            })
            .collect()
    }

    /// Evaluate a submission: all testcase graphs run fully in parallel,
    /// each against its own frame and bus, and their verdicts aggregate into
    /// one task verdict.
    pub async fn evaluate(
        &self,
        user_inputs: &[UserInput],
        sandbox: Arc<dyn SandboxRunner>,
        config: ExecutorConfig,
    ) -> Result<TaskVerdict, EngineError> {
        let graphs = self.validate(user_inputs)?;
        let submission_id: SubmissionId = Uuid::new_v4();

        // The task's declared environment drives every sandbox call.
        let config = ExecutorConfig {
            environment: self.definition.environment.clone(),
            ..config
        };

        info!(
            task_id = self.definition.id,
            submission_id = %submission_id,
            testcases = graphs.len(),
            "evaluating submission"
        );

        let mut join_set = tokio::task::JoinSet::new();
        for (index, graph) in graphs.into_iter().enumerate() {
            let testcase_id = self.definition.testcases[index].id;
            let executor = GraphExecutor::new(sandbox.clone()).with_config(config.clone());
            join_set.spawn(async move {
                let verdict = executor.execute(&graph, &InputBindings::new()).await;
                (index, testcase_id, verdict)
            });
        }

        let mut slots: Vec<Option<TestcaseVerdict>> =
            std::iter::repeat_with(|| None).take(self.definition.testcases.len()).collect();
        while let Some(joined) = join_set.join_next().await {
            let (index, testcase_id, verdict) =
                joined.map_err(|err| EngineError::Internal(err.to_string()))?;
            // An unavailable collaborator aborts the whole submission; the
            // remaining executions are cancelled when the set drops.
            let verdict = verdict?;
            slots[index] = Some(TestcaseVerdict {
                testcase_id,
                verdict,
            });
        }

        let testcases: Vec<TestcaseVerdict> = slots.into_iter().flatten().collect();
        let passed = testcases.len() == self.definition.testcases.len()
            && testcases.iter().all(|t| t.verdict.passed);

        Ok(TaskVerdict {
            task_id: self.definition.id,
            submission_id,
            passed,
            testcases,
        })
    }
}
