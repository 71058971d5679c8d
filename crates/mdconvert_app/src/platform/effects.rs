use mdconvert_core::{Effect, Msg, RemoteState, StatusReport, Timestamp};
use mdconvert_engine::{
    prepare_preview_content, EngineEvent, EngineHandle, RemoteStatus, UploadFile,
};
use mdconvert_logging::{convert_info, convert_warn};

/// Executes tracker effects on the engine and turns engine events back into
/// tracker messages.
pub struct EffectRunner {
    engine: EngineHandle,
    /// One-shot requests (batch status, clear, preview, download) still
    /// waiting for their answer.
    awaiting_replies: usize,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            awaiting_replies: 0,
        }
    }

    pub fn awaiting_replies(&self) -> usize {
        self.awaiting_replies
    }

    #[cfg(test)]
    pub fn active_pollers(&self) -> usize {
        self.engine.active_pollers()
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.engine.next_event().await
    }

    /// Runs `effect` against the backend. Effects that concern the driver
    /// itself (storage, quitting) are handed back.
    pub fn run(&mut self, effect: Effect) -> Option<Effect> {
        match effect {
            Effect::Upload { id, source } => match source.path {
                Some(path) => {
                    convert_info!("Upload id={} name={} size={}", id, source.name, source.size);
                    self.engine.submit(
                        id,
                        UploadFile {
                            name: source.name,
                            path,
                        },
                    );
                }
                None => convert_warn!("Upload of task {} requested without content", id),
            },
            Effect::StartPolling { id, remote_id } => self.engine.start_polling(id, remote_id),
            Effect::StopPolling { id } => self.engine.stop_polling(id),
            Effect::RefreshStatuses { remote_ids } => {
                self.awaiting_replies += 1;
                self.engine.refresh_statuses(remote_ids);
            }
            Effect::ClearRemoteHistory { remote_ids } => {
                self.awaiting_replies += 1;
                self.engine.clear_history(remote_ids);
            }
            Effect::FetchPreview { id, remote_id } => {
                self.awaiting_replies += 1;
                self.engine.preview(id, remote_id);
            }
            Effect::Download {
                id,
                remote_id,
                file_name,
            } => {
                self.awaiting_replies += 1;
                self.engine.download(id, remote_id, file_name);
            }
            Effect::Shutdown => {
                self.engine.shutdown();
                return Some(Effect::Shutdown);
            }
            Effect::EraseStorage | Effect::ConfirmQuit => return Some(effect),
        }
        None
    }

    /// Maps an engine event to the message the tracker understands.
    pub fn translate(&mut self, event: EngineEvent, now: Timestamp) -> Msg {
        match event {
            EngineEvent::Submitted { task_id, result } => match result {
                Ok(receipt) => Msg::SubmitSucceeded {
                    id: task_id,
                    remote_id: receipt.id,
                },
                Err(err) => Msg::SubmitFailed {
                    id: task_id,
                    message: err.to_string(),
                },
            },
            EngineEvent::Polled { task_id, result } => match result {
                Ok(status) => Msg::StatusPolled {
                    id: task_id,
                    report: status_report(status),
                    now,
                },
                Err(err) => Msg::PollFailed {
                    id: task_id,
                    message: err.to_string(),
                },
            },
            EngineEvent::BatchPolled { result } => {
                self.reply_received();
                match result {
                    Ok(statuses) => Msg::BatchStatusReceived {
                        entries: statuses
                            .into_iter()
                            .map(|(remote_id, status)| (remote_id, status_report(status)))
                            .collect(),
                        now,
                    },
                    Err(err) => {
                        // Individual pollers still cover every task.
                        convert_warn!("Batch status check failed: {}", err);
                        Msg::NoOp
                    }
                }
            }
            EngineEvent::HistoryCleared { result } => {
                self.reply_received();
                match result {
                    Ok(()) => Msg::NoOp,
                    Err(err) => Msg::ClearHistoryFailed {
                        message: err.to_string(),
                    },
                }
            }
            EngineEvent::PreviewFetched { task_id, result } => {
                self.reply_received();
                match result {
                    Ok(preview) => Msg::PreviewLoaded {
                        id: task_id,
                        filename: preview.filename,
                        content: prepare_preview_content(&preview.content),
                    },
                    Err(err) => Msg::PreviewFailed {
                        id: task_id,
                        message: err.to_string(),
                    },
                }
            }
            EngineEvent::Downloaded { task_id, result } => {
                self.reply_received();
                match result {
                    Ok(path) => Msg::DownloadSaved { id: task_id, path },
                    Err(err) => Msg::DownloadFailed {
                        id: task_id,
                        message: err.to_string(),
                    },
                }
            }
        }
    }

    fn reply_received(&mut self) {
        self.awaiting_replies = self.awaiting_replies.saturating_sub(1);
    }
}

fn status_report(status: RemoteStatus) -> StatusReport {
    let progress = status.percent();
    StatusReport {
        state: RemoteState::parse(&status.state),
        progress,
        description: status.description,
        preview_url: status.preview_url,
        download_url: status.download_url,
        error: status.error,
    }
}

#[cfg(test)]
mod tests {
    use mdconvert_core::RemoteState;
    use mdconvert_engine::RemoteStatus;

    use super::status_report;

    #[test]
    fn remote_status_maps_to_report() {
        let report = status_report(RemoteStatus {
            state: "FAILURE".to_string(),
            progress: 12.6,
            description: Some("Converting".to_string()),
            preview_url: None,
            download_url: None,
            error: Some("corrupt file".to_string()),
        });
        assert_eq!(report.state, RemoteState::Failure);
        assert_eq!(report.progress, 13);
        assert_eq!(report.error.as_deref(), Some("corrupt file"));
    }

    #[test]
    fn unknown_states_are_kept() {
        let report = status_report(RemoteStatus {
            state: "STARTED".to_string(),
            progress: 0.0,
            description: None,
            preview_url: None,
            download_url: None,
            error: None,
        });
        assert_eq!(report.state, RemoteState::Other("STARTED".to_string()));
    }
}
