//! Bounded wait for an invoker that reports an in-flight call.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::ToolInvoker;

/// Polls [`ToolInvoker::is_busy`] every `poll_interval` until it clears.
///
/// Gives up once `budget` has elapsed or the run is cancelled. Giving up is
/// logged, never an error; the return value tells whether the invoker was
/// observed idle.
pub async fn wait_until_idle(invoker: &dyn ToolInvoker, poll_interval: Duration, budget: Duration, cancel: &CancellationToken) -> bool {
    let started = Instant::now();
    while invoker.is_busy() {
        if started.elapsed() >= budget {
            warn!(waited_ms = started.elapsed().as_millis() as u64, "timed out waiting for in-flight tool call");
            return false;
        }
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = sleep(poll_interval) => {}
        }
    }
    true
}
