use std::path::PathBuf;

use crate::{RemoteTaskId, SourceFile, StatusReport, TaskId, TaskRecord, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User selected files for conversion.
    FilesAdded(Vec<SourceFile>),
    /// User asked to convert every pending file.
    SubmitClicked,
    /// User asked to retry a failed file.
    RetryClicked { id: TaskId },
    /// User removed a file before submitting it.
    RemoveClicked { id: TaskId },
    /// User cleared the conversion history.
    ClearHistoryClicked,
    PreviewRequested { id: TaskId },
    DownloadRequested { id: TaskId },
    /// Startup restore of the persisted task list.
    RestoreFromStorage {
        records: Vec<TaskRecord>,
        now: Timestamp,
    },
    /// Backend accepted an upload.
    SubmitSucceeded { id: TaskId, remote_id: RemoteTaskId },
    /// Upload was rejected or never reached the backend.
    SubmitFailed { id: TaskId, message: String },
    /// One status poll answered.
    StatusPolled {
        id: TaskId,
        report: StatusReport,
        now: Timestamp,
    },
    /// A status poll could not reach the backend; polling for the task has stopped.
    PollFailed { id: TaskId, message: String },
    BatchStatusReceived {
        entries: Vec<(RemoteTaskId, StatusReport)>,
        now: Timestamp,
    },
    ClearHistoryFailed { message: String },
    PreviewLoaded {
        id: TaskId,
        filename: String,
        content: String,
    },
    PreviewFailed { id: TaskId, message: String },
    DownloadSaved { id: TaskId, path: PathBuf },
    DownloadFailed { id: TaskId, message: String },
    /// Periodic clock tick driving the elapsed-time display.
    Tick { now: Timestamp },
    /// User tried to leave (interrupt, window close).
    QuitRequested,
    QuitConfirmed,
    QuitCancelled,
    /// Fallback for placeholder wiring.
    NoOp,
}
