// Execution Module
// Frame, events, and the plan-driven graph executor

pub mod events;
pub mod executor;
pub mod frame;

pub use events::{
    progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender,
};
pub use executor::{
    ExecutionTrace, ExecutorConfig, GraphExecutor, NodeOutcome, NodeStatus,
};
pub use frame::{ExecutionFrame, FrameError};
