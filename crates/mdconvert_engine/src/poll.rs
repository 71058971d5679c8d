use std::sync::Arc;
use std::time::Duration;

use mdconvert_logging::{convert_debug, convert_warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{ConversionApi, EngineEvent, TaskId};

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Queries the status of one remote task every `interval` until the backend
/// reports a terminal state, a query fails, or `cancel` fires. Only one query
/// is ever outstanding, so answers reach the tracker in order.
pub(crate) async fn poll_until_settled(
    api: Arc<dyn ConversionApi>,
    task_id: TaskId,
    remote_id: String,
    settings: PollSettings,
    cancel: CancellationToken,
    events: UnboundedSender<EngineEvent>,
) {
    // Cancelled on every exit, so the handle stops counting a finished poller.
    let _finished = cancel.clone().drop_guard();
    let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                convert_debug!("Poller for task {} cancelled", task_id);
                return;
            }
            _ = ticker.tick() => {}
        }

        let result = api.status(&remote_id).await;
        if cancel.is_cancelled() {
            convert_debug!("Dropping status answer for stopped task {}", task_id);
            return;
        }

        let finished = match &result {
            Ok(status) => status.is_terminal(),
            Err(err) => {
                convert_warn!("Status check for task {} failed: {}", task_id, err);
                true
            }
        };
        if events.send(EngineEvent::Polled { task_id, result }).is_err() || finished {
            return;
        }
    }
}
