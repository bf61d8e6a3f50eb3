// Queue Sandbox Client
// Dispatches sandbox requests through a job queue with reply correlation

use grader_engine::sandbox::{SandboxOutcome, SandboxRequest, SandboxRunner, SandboxUnavailable};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// One unit of sandbox work: the request plus its reply slot.
///
/// Correlation is carried by the reply channel itself; the submission id in
/// the request is for the worker's own bookkeeping and logs.
#[derive(Debug)]
pub struct SandboxJob {
    pub request: SandboxRequest,
    reply: oneshot::Sender<SandboxOutcome>,
}

impl SandboxJob {
    /// Hand the structured result back to the waiting execution.
    pub fn complete(self, outcome: SandboxOutcome) {
        // The requester may have been cancelled by its deadline; a dropped
        // receiver is not the worker's problem.
        let _ = self.reply.send(outcome);
    }
}

/// Create a bounded sandbox queue: the client half the engine dispatches
/// through, and the worker half the isolated-execution harness consumes.
pub fn sandbox_queue(capacity: usize) -> (QueueSandboxClient, SandboxWorker) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueSandboxClient { tx }, SandboxWorker { rx })
}

/// `SandboxRunner` implementation backed by the job queue.
///
/// The queue capacity is the admission/backpressure policy of the sandbox
/// pool; the engine itself just sees a blocking call. A closed queue or a
/// dropped job surfaces as `SandboxUnavailable`, the infrastructure fault
/// the engine keeps distinct from grading failures.
#[derive(Clone)]
pub struct QueueSandboxClient {
    tx: mpsc::Sender<SandboxJob>,
}

#[async_trait::async_trait]
impl SandboxRunner for QueueSandboxClient {
    async fn run(&self, request: SandboxRequest) -> Result<SandboxOutcome, SandboxUnavailable> {
        let submission_id = request.submission_id;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(SandboxJob {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SandboxUnavailable::new("sandbox queue is closed"))?;

        debug!(%submission_id, "sandbox job enqueued");

        reply_rx
            .await
            .map_err(|_| SandboxUnavailable::new("sandbox worker dropped the job"))
    }
}

/// Consumer half of the queue, handed to the worker harness.
pub struct SandboxWorker {
    rx: mpsc::Receiver<SandboxJob>,
}

impl SandboxWorker {
    /// Receive the next job; `None` once every client handle is gone.
    pub async fn next_job(&mut self) -> Option<SandboxJob> {
        self.rx.recv().await
    }
}
