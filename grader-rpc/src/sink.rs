// Verdict Sink
// Channel-backed delivery of verdicts to the host platform's consumer

use grader_engine::task::{SinkClosed, TaskVerdict, VerdictSink};

use tokio::sync::mpsc;
use tracing::debug;

/// Receiver half handed to the persistence/display consumer.
pub type VerdictReceiver = mpsc::UnboundedReceiver<TaskVerdict>;

/// Create a verdict channel: the sink the engine publishes through and the
/// receiver the host consumes.
pub fn verdict_channel() -> (ChannelVerdictSink, VerdictReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelVerdictSink { tx }, rx)
}

/// `VerdictSink` implementation over an in-process channel. The engine never
/// persists results itself; whatever sits on the other end does.
#[derive(Clone)]
pub struct ChannelVerdictSink {
    tx: mpsc::UnboundedSender<TaskVerdict>,
}

#[async_trait::async_trait]
impl VerdictSink for ChannelVerdictSink {
    async fn publish(&self, verdict: TaskVerdict) -> Result<(), SinkClosed> {
        debug!(
            task_id = verdict.task_id,
            submission_id = %verdict.submission_id,
            passed = verdict.passed,
            "publishing verdict"
        );
        self.tx
            .send(verdict)
            .map_err(|_| SinkClosed::new("verdict receiver is gone"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn verdict(passed: bool) -> TaskVerdict {
        TaskVerdict {
            task_id: 1,
            submission_id: Uuid::new_v4(),
            passed,
            testcases: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_the_receiver() {
        let (sink, mut rx) = verdict_channel();
        sink.publish(verdict(true)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert!(received.passed);
    }

    #[tokio::test]
    async fn test_gone_receiver_reports_closed() {
        let (sink, rx) = verdict_channel();
        drop(rx);

        let err = sink.publish(verdict(false)).await.unwrap_err();
        assert!(err.to_string().contains("receiver is gone"));
    }
}
