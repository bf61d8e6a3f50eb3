// Result Evaluator
// Reduces terminal outputs and failures to a pass/fail verdict

use crate::definition::{NodeId, Visibility};
use crate::error::{ExecutionFailure, FailureKind};
use crate::execution::ExecutionTrace;
use crate::value::Value;

use serde::{Deserialize, Serialize};

/// A realized OUTPUT value with its declared visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub node_id: NodeId,
    pub socket_id: String,
    /// BOOLEAN-typed OUTPUT sockets assert; the rest are payload.
    pub assertion: bool,
    pub visibility: Visibility,
    pub value: Value,
}

/// Where and why an execution failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub node_id: Option<NodeId>,
    pub kind: FailureKind,
    pub message: String,
}

impl From<ExecutionFailure> for FailureRecord {
    fn from(failure: ExecutionFailure) -> Self {
        Self {
            node_id: failure.node_id,
            kind: failure.kind,
            message: failure.message,
        }
    }
}

/// How multiple assertion outputs combine into one pass/fail.
///
/// A test case may assert several independent checks; the default requires
/// all of them. Partial credit is deliberately not modelled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationPolicy {
    #[default]
    AllPass,
    AnyPass,
}

impl AggregationPolicy {
    fn aggregate(self, assertions: &[&OutputRecord]) -> bool {
        if assertions.is_empty() {
            // Nothing to grade; only an upstream failure can fail the run.
            return true;
        }
        match self {
            AggregationPolicy::AllPass => assertions.iter().all(|r| r.value.is_truthy()),
            AggregationPolicy::AnyPass => assertions.iter().any(|r| r.value.is_truthy()),
        }
    }
}

/// The terminal artifact of one graph execution. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub outputs: Vec<OutputRecord>,
    pub failure: Option<FailureRecord>,
}

impl Verdict {
    /// The grading-visible records, public and private alike.
    pub fn outputs(&self) -> &[OutputRecord] {
        &self.outputs
    }

    pub fn public_outputs(&self) -> impl Iterator<Item = &OutputRecord> {
        self.outputs
            .iter()
            .filter(|r| r.visibility == Visibility::Public)
    }

    /// The submitter-facing view: pass/fail and public values only. Failure
    /// kinds and private outputs are withheld.
    pub fn public_view(&self) -> PublicVerdict {
        PublicVerdict {
            passed: self.passed,
            outputs: self
                .public_outputs()
                .map(|r| PublicOutput {
                    node_id: r.node_id,
                    socket_id: r.socket_id.clone(),
                    value: r.value.clone(),
                })
                .collect(),
        }
    }
}

/// What a submitter is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicVerdict {
    pub passed: bool,
    pub outputs: Vec<PublicOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicOutput {
    pub node_id: NodeId,
    pub socket_id: String,
    pub value: Value,
}

/// Evaluates an execution trace into a verdict.
pub struct ResultEvaluator {
    policy: AggregationPolicy,
}

impl ResultEvaluator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    /// A graph passes iff no failure occurred upstream and the aggregation
    /// policy holds over every assertion output.
    pub fn evaluate(&self, trace: &ExecutionTrace) -> Verdict {
        let assertions: Vec<&OutputRecord> =
            trace.outputs.iter().filter(|r| r.assertion).collect();
        let passed = trace.failure.is_none() && self.policy.aggregate(&assertions);

        Verdict {
            passed,
            outputs: trace.outputs.clone(),
            failure: trace.failure.clone(),
        }
    }
}

impl Default for ResultEvaluator {
    fn default() -> Self {
        Self::new(AggregationPolicy::AllPass)
    }
}
