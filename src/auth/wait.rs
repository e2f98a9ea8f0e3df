use std::time::Duration;

use tokio::time::sleep;
use tracing::trace;

use super::queue::{AuthQueue, LoginOutcome, QueueResult, QueueStatus};

/// Poll interval used when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Resolve a submission result, polling the queue until a queued item is processed.
///
/// Immediate results come back without suspending. There is deliberately no upper bound
/// on the total wait: the queue is trusted to eventually process every item.
pub async fn wait_for_result(
    queue: &dyn AuthQueue,
    result: QueueResult,
    poll_interval: Duration,
) -> LoginOutcome {
    let poll_token = match result {
        QueueResult::Completed(outcome) => return outcome,
        QueueResult::Queued { poll_token } => poll_token,
    };

    let mut polls = 0u64;
    loop {
        polls += 1;
        match queue.poll_status(poll_token) {
            QueueStatus::Processed(outcome) => {
                trace!(%poll_token, polls, "Queued auth item processed");
                return outcome;
            }
            QueueStatus::Pending => {
                trace!(%poll_token, polls, "Queued auth item still pending");
                sleep(poll_interval).await;
            }
        }
    }
}
