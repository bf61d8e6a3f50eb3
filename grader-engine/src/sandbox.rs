// Sandbox Collaborator Contract
// The sole boundary where submitted code runs, behind an isolated worker

use crate::value::{FileArtifact, Value};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use std::collections::BTreeMap;

/// Correlation id for one sandbox submission.
pub type SubmissionId = Uuid;

/// Language/runtime tag of the submitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "PYTHON")]
    Python,
}

/// Execution environment a sandbox run happens under.
///
/// The task declares defaults; a RUN_FUNCTION node may override the limits
/// in its own configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerEnvironment {
    #[serde(default)]
    pub language: Language,
    /// Wall-clock limit in seconds.
    pub time_limit_secs: u64,
    /// Memory limit in megabytes.
    pub memory_limit_mb: u64,
    #[serde(default)]
    pub extra_options: BTreeMap<String, Value>,
}

impl RunnerEnvironment {
    pub fn python(time_limit_secs: u64, memory_limit_mb: u64) -> Self {
        Self {
            language: Language::Python,
            time_limit_secs,
            memory_limit_mb,
            extra_options: BTreeMap::new(),
        }
    }

    /// Apply per-node limit overrides.
    pub fn with_limits(mut self, time_limit_secs: Option<u64>, memory_limit_mb: Option<u64>) -> Self {
        if let Some(secs) = time_limit_secs {
            self.time_limit_secs = secs;
        }
        if let Some(mb) = memory_limit_mb {
            self.memory_limit_mb = mb;
        }
        self
    }
}

/// A request handed to the sandbox collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxRequest {
    pub submission_id: SubmissionId,
    /// The module containing the function to invoke.
    pub file: FileArtifact,
    pub function_name: String,
    /// Positional arguments in socket declaration order.
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, Value>,
    pub environment: RunnerEnvironment,
}

/// Which resource limit a sandbox run breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceLimit {
    Time,
    Memory,
}

/// Structured result of one sandbox run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SandboxOutcome {
    /// The function returned normally.
    #[serde(rename = "OK")]
    Return { value: Value },
    /// The submitted code raised.
    #[serde(rename = "ERROR")]
    RuntimeError { message: String },
    /// A configured limit was exceeded inside the sandbox.
    #[serde(rename = "LIMIT_EXCEEDED")]
    LimitExceeded { limit: ResourceLimit },
}

/// The sandbox or its transport is unreachable.
///
/// This is an infrastructure fault, distinct from every grading failure; the
/// engine surfaces it to the caller instead of folding it into a verdict.
#[derive(Debug, Clone, Error)]
#[error("sandbox unavailable: {message}")]
pub struct SandboxUnavailable {
    pub message: String,
}

impl SandboxUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The isolated-execution collaborator.
///
/// Implementations dispatch over whatever transport the deployment uses
/// (message queue, direct RPC); the engine only sees a blocking call with a
/// structured result. Deadlines are enforced by the caller, which drops the
/// future on cancellation.
#[async_trait::async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, request: SandboxRequest) -> Result<SandboxOutcome, SandboxUnavailable>;
}
