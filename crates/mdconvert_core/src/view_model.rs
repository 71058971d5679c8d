use crate::state::ConversionTask;
use crate::{RemoteTaskId, SessionState, TaskId, TaskStatus, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient, action-scoped message for the user. `seq` grows with every
/// notice so renderers can tell a new notice from a repeated view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub seq: u64,
    pub level: NoticeLevel,
    pub task_id: Option<TaskId>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewView {
    pub task_id: TaskId,
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub tasks: Vec<TaskRowView>,
    pub task_count: usize,
    pub pending_count: usize,
    pub converting_count: usize,
    pub completed_count: usize,
    pub error_count: usize,
    /// `HH:MM:SS` since the current batch of conversions started.
    pub elapsed: String,
    pub notice: Option<Notice>,
    pub preview: Option<PreviewView>,
    pub dirty: bool,
}

impl AppViewModel {
    pub fn task(&self, id: TaskId) -> Option<&TaskRowView> {
        self.tasks.iter().find(|row| row.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRowView {
    pub id: TaskId,
    pub file_name: String,
    pub file_size: u64,
    pub status: TaskStatus,
    pub progress: u8,
    pub remote_id: Option<RemoteTaskId>,
    pub description: Option<String>,
    pub error: Option<String>,
    pub preview_url: Option<String>,
    pub download_url: Option<String>,
    pub completed_at: Option<Timestamp>,
}

impl TaskRowView {
    pub(crate) fn from_task(task: &ConversionTask) -> Self {
        Self {
            id: task.id,
            file_name: task.source.name.clone(),
            file_size: task.source.size,
            status: task.status,
            progress: task.progress,
            remote_id: task.remote_id.clone(),
            description: task.description.clone(),
            error: task.error.clone(),
            preview_url: task.preview_url.clone(),
            download_url: task.download_url.clone(),
            completed_at: task.completed_at,
        }
    }
}

pub fn format_elapsed(elapsed_ms: Timestamp) -> String {
    let total_secs = elapsed_ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
