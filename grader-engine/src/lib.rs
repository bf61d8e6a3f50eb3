// Grader Engine Library
// Task-graph validation and execution for autograded programming exercises

pub mod definition;
pub mod error;
pub mod execution;
pub mod executors;
pub mod graph;
pub mod plan;
pub mod sandbox;
pub mod task;
pub mod value;
pub mod verdict;

// Re-export commonly used types
pub use error::{EngineError, ExecutionFailure, FailureKind};

// Re-export definition types
pub use definition::{
    CompareOp, EdgeDefinition, LoopPredicate, NodeConfig, NodeDefinition, NodeId, NodeKind,
    RequiredInputDefinition, SocketDefinition, SocketRef, TaskDefinition, TestcaseDefinition,
    UserInput, ValidationError, ValidationErrorKind, Visibility,
};

// Re-export graph and plan types
pub use graph::Graph;
pub use plan::{ExecutionPlan, ExecutionUnit};

// Re-export execution types
pub use execution::{
    progress_channel, EventSender, ExecutionEvent, ExecutionFrame, ExecutionTrace, ExecutorConfig,
    FrameError, GraphExecutor, NodeOutcome, NodeStatus, ProgressReceiver, ProgressSender,
};

// Re-export executor types
pub use executors::{BoundInputs, ExecutorRegistry, InputBindings, NodeExecutor};

// Re-export sandbox collaborator types
pub use sandbox::{
    Language, ResourceLimit, RunnerEnvironment, SandboxOutcome, SandboxRequest, SandboxRunner,
    SandboxUnavailable, SubmissionId,
};

// Re-export task and verdict types
pub use task::{SinkClosed, Task, TaskVerdict, TestcaseVerdict, VerdictSink};
pub use value::{EdgeCoercion, FileArtifact, SocketType, Value};
pub use verdict::{
    AggregationPolicy, FailureRecord, OutputRecord, PublicOutput, PublicVerdict, ResultEvaluator,
    Verdict,
};
