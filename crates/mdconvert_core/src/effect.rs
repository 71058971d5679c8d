use crate::{RemoteTaskId, SourceFile, TaskId};

/// Side effects requested by [`crate::update`]. The driver executes them and
/// feeds the outcome back as [`crate::Msg`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Upload the file content together with the device identifier.
    Upload { id: TaskId, source: SourceFile },
    /// Start the single status poller for a task, replacing any previous one.
    StartPolling { id: TaskId, remote_id: RemoteTaskId },
    StopPolling { id: TaskId },
    /// One batched status query for tasks resumed from storage.
    RefreshStatuses { remote_ids: Vec<RemoteTaskId> },
    /// Best-effort remote clear; local state is already gone when this runs.
    ClearRemoteHistory { remote_ids: Vec<RemoteTaskId> },
    EraseStorage,
    FetchPreview { id: TaskId, remote_id: RemoteTaskId },
    Download {
        id: TaskId,
        remote_id: RemoteTaskId,
        file_name: String,
    },
    /// Ask the user whether to quit while conversions are still running.
    ConfirmQuit,
    /// Tear down: cancel every poller and stop the event loop.
    Shutdown,
}
