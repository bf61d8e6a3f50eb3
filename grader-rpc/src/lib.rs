// Grader RPC Library
// Collaborator boundary for the grader engine: sandbox queue client,
// verdict sink, and the host-facing handler

pub mod client;
pub mod error;
pub mod handlers;
pub mod sink;

pub use client::{sandbox_queue, QueueSandboxClient, SandboxJob, SandboxWorker};
pub use error::{RpcError, RpcResult};
pub use handlers::EngineHandler;
pub use sink::{verdict_channel, ChannelVerdictSink, VerdictReceiver};

// Re-export types needed by clients
pub use grader_engine;
pub use grader_engine::sandbox::{SandboxOutcome, SandboxRequest, SandboxRunner};
pub use grader_engine::task::{TaskVerdict, VerdictSink};
