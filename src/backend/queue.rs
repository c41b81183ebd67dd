use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use super::results::{GameResult, ResultSink};

/// Delay between attempts to record the same result
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Attempts per result before it is dropped
const MAX_ATTEMPTS: u32 = 3;

/// Non-blocking queue for recording finished games
///
/// The round engine emits a result the moment a session reaches its end
/// state and never waits on the sink. Failures are logged and dropped; the
/// in-memory outcome already shown to players is never rolled back.
#[derive(Clone)]
pub struct ResultQueue {
    sender: mpsc::UnboundedSender<GameResult>,
}

impl ResultQueue {
    /// Creates a new queue with a background processor
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(Self::process_results(sink, receiver));

        Self { sender }
    }

    /// Queues a result for recording. Returns immediately.
    pub fn emit(&self, result: GameResult) {
        tracing::info!(join_code = result.join_code, "Queueing game result");
        if let Err(e) = self.sender.send(result) {
            tracing::error!(error = %e, "Failed to queue game result");
        }
    }

    async fn process_results(
        sink: Arc<dyn ResultSink>,
        mut receiver: mpsc::UnboundedReceiver<GameResult>,
    ) {
        tracing::info!("Result processor started");

        while let Some(result) = receiver.recv().await {
            let mut attempt = 1;
            loop {
                match sink.record(&result).await {
                    Ok(()) => {
                        tracing::debug!(join_code = result.join_code, "Game result recorded");
                        break;
                    }
                    Err(e) if attempt < MAX_ATTEMPTS => {
                        tracing::warn!(
                            join_code = result.join_code,
                            attempt = attempt,
                            error = %e,
                            "Failed to record game result, retrying"
                        );
                        attempt += 1;
                        sleep(RETRY_DELAY).await;
                    }
                    Err(e) => {
                        tracing::error!(
                            join_code = result.join_code,
                            error = %e,
                            "Giving up on game result"
                        );
                        break;
                    }
                }
            }
        }

        tracing::info!("Result processor stopped");
    }
}
