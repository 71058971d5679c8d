use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use mdconvert_logging::{convert_debug, convert_info, convert_warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::filename::sanitize_file_name;
use crate::persist::AtomicFileWriter;
use crate::poll::{poll_until_settled, PollSettings};
use crate::{ApiError, ConversionApi, EngineEvent, FailureKind, TaskId, UploadFile};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub device_id: String,
    pub poll: PollSettings,
    /// Where downloaded Markdown files are written.
    pub output_dir: PathBuf,
}

/// Executes tracker effects against the conversion backend.
///
/// Every command spawns its own tokio task and reports back through a single
/// event channel, so the owner of the handle observes all outcomes on one
/// task. Must be created inside a tokio runtime.
pub struct EngineHandle {
    api: Arc<dyn ConversionApi>,
    config: EngineConfig,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
    pollers: HashMap<TaskId, CancellationToken>,
}

impl EngineHandle {
    pub fn new(api: Arc<dyn ConversionApi>, config: EngineConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            api,
            config,
            event_tx,
            event_rx,
            pollers: HashMap::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    /// Number of pollers that have been started and not stopped.
    pub fn active_pollers(&self) -> usize {
        self.pollers
            .values()
            .filter(|token| !token.is_cancelled())
            .count()
    }

    pub fn is_polling(&self, task_id: TaskId) -> bool {
        self.pollers
            .get(&task_id)
            .is_some_and(|token| !token.is_cancelled())
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn submit(&self, task_id: TaskId, file: UploadFile) {
        let api = self.api.clone();
        let device_id = self.config.device_id.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.submit(&file, &device_id).await;
            match &result {
                Ok(receipt) => convert_info!("Task {} accepted as {}", task_id, receipt.id),
                Err(err) => convert_warn!("Upload of {} failed: {}", file.name, err),
            }
            let _ = event_tx.send(EngineEvent::Submitted { task_id, result });
        });
    }

    /// Starts the poller for `task_id`, cancelling any poller already
    /// registered for it.
    pub fn start_polling(&mut self, task_id: TaskId, remote_id: String) {
        self.stop_polling(task_id);
        self.pollers.retain(|_, token| !token.is_cancelled());
        let token = CancellationToken::new();
        self.pollers.insert(task_id, token.clone());
        convert_debug!("Polling task {} ({})", task_id, remote_id);
        tokio::spawn(poll_until_settled(
            self.api.clone(),
            task_id,
            remote_id,
            self.config.poll.clone(),
            token,
            self.event_tx.clone(),
        ));
    }

    pub fn stop_polling(&mut self, task_id: TaskId) {
        if let Some(token) = self.pollers.remove(&task_id) {
            token.cancel();
        }
    }

    pub fn refresh_statuses(&self, remote_ids: Vec<String>) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.batch_status(&remote_ids).await;
            let _ = event_tx.send(EngineEvent::BatchPolled { result });
        });
    }

    pub fn clear_history(&self, remote_ids: Vec<String>) {
        let api = self.api.clone();
        let device_id = self.config.device_id.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.clear_history(&remote_ids, &device_id).await;
            if let Err(err) = &result {
                convert_warn!("Clearing remote history failed: {}", err);
            }
            let _ = event_tx.send(EngineEvent::HistoryCleared { result });
        });
    }

    pub fn preview(&self, task_id: TaskId, remote_id: String) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.preview(&remote_id).await;
            let _ = event_tx.send(EngineEvent::PreviewFetched { task_id, result });
        });
    }

    /// Downloads the converted file and stores it as `file_name` inside the
    /// configured output directory.
    pub fn download(&self, task_id: TaskId, remote_id: String, file_name: String) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        let writer = AtomicFileWriter::new(self.config.output_dir.clone());
        tokio::spawn(async move {
            let result = match api.download(&remote_id).await {
                Ok(bytes) => writer
                    .write(&sanitize_file_name(&file_name), &bytes)
                    .map_err(|err| ApiError::new(FailureKind::Storage, err.to_string())),
                Err(err) => Err(err),
            };
            if let Ok(path) = &result {
                convert_info!("Saved task {} to {:?}", task_id, path);
            }
            let _ = event_tx.send(EngineEvent::Downloaded { task_id, result });
        });
    }

    /// Cancels every outstanding poller.
    pub fn shutdown(&mut self) {
        let count = self.pollers.len();
        for (_, token) in self.pollers.drain() {
            token.cancel();
        }
        convert_debug!("Engine shut down, {} pollers cancelled", count);
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
