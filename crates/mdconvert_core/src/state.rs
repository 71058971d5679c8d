use std::path::PathBuf;

use crate::effect::Effect;
use crate::view_model::{format_elapsed, AppViewModel, Notice, NoticeLevel, PreviewView, TaskRowView};

/// Client-side task identifier, unique within the active task list.
pub type TaskId = u64;
/// Identifier assigned by the conversion backend once an upload is accepted.
pub type RemoteTaskId = String;
/// Milliseconds since the Unix epoch, always supplied by the caller.
pub type Timestamp = i64;

/// Persisted records whose last write is older than this are dropped on restore.
pub const HISTORY_TTL_MS: Timestamp = 24 * 60 * 60 * 1000;

const GENERIC_FAILURE: &str = "Conversion failed";
const SOURCE_UNAVAILABLE: &str = "source file is no longer available; add it again";
const UPLOAD_INTERRUPTED: &str = "upload was interrupted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    Converting,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Converting => "converting",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(TaskStatus::Pending),
            "converting" => Some(TaskStatus::Converting),
            "completed" => Some(TaskStatus::Completed),
            "error" => Some(TaskStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Active,
    /// Quit was requested while tasks were converting; waiting on the user.
    ConfirmingQuit,
    ShuttingDown,
}

/// The file a task converts. `path` is the content reference; it is persisted
/// as metadata so a restored task can be uploaded again while the file exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    pub path: Option<PathBuf>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, size: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            size,
            path: Some(path.into()),
        }
    }

    pub fn has_content(&self) -> bool {
        self.path.is_some()
    }
}

/// State string reported by the backend status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    Pending,
    Progress,
    Success,
    Failure,
    /// Any other in-flight state the backend may surface (`STARTED`, `RETRY`, ...).
    Other(String),
}

impl RemoteState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => RemoteState::Pending,
            "PROGRESS" => RemoteState::Progress,
            "SUCCESS" => RemoteState::Success,
            "FAILURE" => RemoteState::Failure,
            other => RemoteState::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteState::Success | RemoteState::Failure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub state: RemoteState,
    pub progress: u8,
    pub description: Option<String>,
    pub preview_url: Option<String>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl StatusReport {
    pub fn new(state: RemoteState, progress: u8) -> Self {
        Self {
            state,
            progress,
            description: None,
            preview_url: None,
            download_url: None,
            error: None,
        }
    }
}

/// Flat snapshot of one task, as written to and read from durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub file_name: String,
    pub file_size: u64,
    /// Where the file was read from, when known.
    pub source_path: Option<PathBuf>,
    pub remote_id: Option<RemoteTaskId>,
    pub status: TaskStatus,
    pub progress: u8,
    pub timestamp: Timestamp,
    pub preview_url: Option<String>,
    pub download_url: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<Timestamp>,
}

pub fn default_preview_url(remote_id: &str) -> String {
    format!("/api/convert/{remote_id}/preview")
}

pub fn default_download_url(remote_id: &str) -> String {
    format!("/api/convert/{remote_id}/download")
}

/// Download name offered for a converted file: the original name with its
/// last non-empty extension replaced by `.md`.
pub fn markdown_file_name(original: &str) -> String {
    let stem = match original.rfind('.') {
        Some(idx) if idx + 1 < original.len() && !original[idx + 1..].contains('/') => {
            &original[..idx]
        }
        _ => original,
    };
    format!("{stem}.md")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConversionTask {
    pub(crate) id: TaskId,
    pub(crate) source: SourceFile,
    pub(crate) status: TaskStatus,
    pub(crate) progress: u8,
    pub(crate) remote_id: Option<RemoteTaskId>,
    pub(crate) description: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) preview_url: Option<String>,
    pub(crate) download_url: Option<String>,
    pub(crate) completed_at: Option<Timestamp>,
}

impl ConversionTask {
    fn pending(id: TaskId, source: SourceFile) -> Self {
        Self {
            id,
            source,
            status: TaskStatus::Pending,
            progress: 0,
            remote_id: None,
            description: None,
            error: None,
            preview_url: None,
            download_url: None,
            completed_at: None,
        }
    }

    fn fail(&mut self, message: String) {
        self.status = TaskStatus::Error;
        self.error = Some(message);
    }

    fn is_polling(&self) -> bool {
        self.status == TaskStatus::Converting && self.remote_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ElapsedTimer {
    started_at: Option<Timestamp>,
    display: String,
}

impl Default for ElapsedTimer {
    fn default() -> Self {
        Self {
            started_at: None,
            display: format_elapsed(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    tasks: Vec<ConversionTask>,
    next_id: TaskId,
    session: SessionState,
    elapsed: ElapsedTimer,
    notice: Option<Notice>,
    notice_seq: u64,
    preview: Option<PreviewView>,
    dirty: bool,
    tasks_dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            session: SessionState::default(),
            elapsed: ElapsedTimer::default(),
            notice: None,
            notice_seq: 0,
            preview: None,
            dirty: false,
            tasks_dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_converting(&self) -> bool {
        self.tasks
            .iter()
            .any(|task| task.status == TaskStatus::Converting)
    }

    /// True when no task is waiting on the backend.
    pub fn is_settled(&self) -> bool {
        !self.has_converting()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|task| task.id == id)
    }

    /// Returns and clears the render flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Returns and clears the flag telling the driver the task list must be
    /// written back to storage.
    pub fn consume_tasks_dirty(&mut self) -> bool {
        std::mem::take(&mut self.tasks_dirty)
    }

    pub fn task_records(&self, now: Timestamp) -> Vec<TaskRecord> {
        self.tasks
            .iter()
            .map(|task| TaskRecord {
                id: task.id,
                file_name: task.source.name.clone(),
                file_size: task.source.size,
                source_path: task.source.path.clone(),
                remote_id: task.remote_id.clone(),
                status: task.status,
                progress: task.progress,
                timestamp: now,
                preview_url: task.preview_url.clone(),
                download_url: task.download_url.clone(),
                error: task.error.clone(),
                completed_at: task.completed_at,
            })
            .collect()
    }

    pub fn view(&self) -> AppViewModel {
        let count = |status: TaskStatus| self.tasks.iter().filter(|t| t.status == status).count();
        AppViewModel {
            session: self.session,
            tasks: self.tasks.iter().map(TaskRowView::from_task).collect(),
            task_count: self.tasks.len(),
            pending_count: count(TaskStatus::Pending),
            converting_count: count(TaskStatus::Converting),
            completed_count: count(TaskStatus::Completed),
            error_count: count(TaskStatus::Error),
            elapsed: self.elapsed.display.clone(),
            notice: self.notice.clone(),
            preview: self.preview.clone(),
            dirty: self.dirty,
        }
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn mark_tasks_dirty(&mut self) {
        self.dirty = true;
        self.tasks_dirty = true;
    }

    fn task_mut(&mut self, id: TaskId) -> Option<&mut ConversionTask> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    fn task(&self, id: TaskId) -> Option<&ConversionTask> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub(crate) fn notify(&mut self, level: NoticeLevel, task_id: Option<TaskId>, text: String) {
        self.notice_seq += 1;
        self.notice = Some(Notice {
            seq: self.notice_seq,
            level,
            task_id,
            text,
        });
        self.mark_dirty();
    }

    pub(crate) fn add_files(&mut self, files: Vec<SourceFile>) -> usize {
        let mut added = 0;
        for source in files {
            let id = self.next_id;
            let Some(next_id) = id.checked_add(1) else {
                self.notify(NoticeLevel::Error, None, "no task ids left".to_string());
                break;
            };
            self.next_id = next_id;
            self.tasks.push(ConversionTask::pending(id, source));
            added += 1;
        }
        if added > 0 {
            self.mark_tasks_dirty();
        }
        added
    }

    pub(crate) fn remove_pending(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks
            .retain(|task| !(task.id == id && task.status == TaskStatus::Pending));
        let removed = self.tasks.len() != before;
        if removed {
            self.mark_tasks_dirty();
        }
        removed
    }

    /// Moves every pending task into `Converting` and returns the uploads to
    /// issue. Pending tasks without content fail on the spot.
    pub(crate) fn submit_pending(&mut self) -> Vec<Effect> {
        let ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
            .map(|task| task.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.submit_one(id))
            .collect()
    }

    fn submit_one(&mut self, id: TaskId) -> Option<Effect> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Pending {
            return None;
        }
        task.progress = 0;
        let effect = if task.source.has_content() {
            task.status = TaskStatus::Converting;
            Some(Effect::Upload {
                id,
                source: task.source.clone(),
            })
        } else {
            task.fail(SOURCE_UNAVAILABLE.to_string());
            None
        };
        self.mark_tasks_dirty();
        effect
    }

    pub(crate) fn retry(&mut self, id: TaskId) -> Option<Effect> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Error {
            return None;
        }
        // A retry is a fresh submission attempt with its own remote id.
        task.status = TaskStatus::Pending;
        task.error = None;
        task.progress = 0;
        task.remote_id = None;
        task.description = None;
        self.mark_tasks_dirty();
        self.submit_one(id)
    }

    pub(crate) fn apply_submitted(&mut self, id: TaskId, remote_id: RemoteTaskId) -> Option<Effect> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Converting || task.remote_id.is_some() {
            return None;
        }
        task.remote_id = Some(remote_id.clone());
        self.mark_tasks_dirty();
        Some(Effect::StartPolling { id, remote_id })
    }

    pub(crate) fn apply_submit_failed(&mut self, id: TaskId, message: String) {
        let Some(task) = self.task_mut(id) else {
            return;
        };
        if task.status != TaskStatus::Converting || task.remote_id.is_some() {
            return;
        }
        task.progress = 0;
        task.fail(non_empty_or(message, GENERIC_FAILURE));
        self.mark_tasks_dirty();
    }

    pub(crate) fn apply_status(
        &mut self,
        id: TaskId,
        report: StatusReport,
        now: Timestamp,
    ) -> Option<Effect> {
        let task = self.task_mut(id)?;
        if !task.is_polling() {
            return None;
        }
        match report.state {
            RemoteState::Success => {
                let remote_id = task.remote_id.clone().unwrap_or_default();
                task.status = TaskStatus::Completed;
                task.progress = 100;
                task.description = report.description;
                task.preview_url = Some(
                    report
                        .preview_url
                        .unwrap_or_else(|| default_preview_url(&remote_id)),
                );
                task.download_url = Some(
                    report
                        .download_url
                        .unwrap_or_else(|| default_download_url(&remote_id)),
                );
                if task.completed_at.is_none() {
                    task.completed_at = Some(now);
                }
                self.mark_tasks_dirty();
                Some(Effect::StopPolling { id })
            }
            RemoteState::Failure => {
                task.description = report.description;
                task.fail(non_empty_or(report.error.unwrap_or_default(), GENERIC_FAILURE));
                self.mark_tasks_dirty();
                Some(Effect::StopPolling { id })
            }
            RemoteState::Pending | RemoteState::Progress | RemoteState::Other(_) => {
                let progress = task.progress.max(report.progress.min(100));
                let changed = progress != task.progress || report.description != task.description;
                task.progress = progress;
                task.description = report.description;
                if changed {
                    self.mark_tasks_dirty();
                }
                None
            }
        }
    }

    pub(crate) fn apply_poll_failed(&mut self, id: TaskId, message: String) -> Option<Effect> {
        let task = self.task_mut(id)?;
        if !task.is_polling() {
            return None;
        }
        task.fail(format!("status check failed: {message}"));
        self.mark_tasks_dirty();
        Some(Effect::StopPolling { id })
    }

    /// Applies terminal entries of a batch status answer to the converting
    /// tasks they belong to, matched by remote id.
    pub(crate) fn apply_batch(
        &mut self,
        entries: Vec<(RemoteTaskId, StatusReport)>,
        now: Timestamp,
    ) -> Vec<Effect> {
        entries
            .into_iter()
            .filter(|(_, report)| report.state.is_terminal())
            .filter_map(|(remote_id, report)| {
                let id = self
                    .tasks
                    .iter()
                    .find(|task| task.is_polling() && task.remote_id.as_deref() == Some(remote_id.as_str()))?
                    .id;
                self.apply_status(id, report, now)
            })
            .collect()
    }

    pub(crate) fn clear_history(&mut self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self
            .tasks
            .iter()
            .filter(|task| task.is_polling())
            .map(|task| Effect::StopPolling { id: task.id })
            .collect();
        let remote_ids = self
            .tasks
            .iter()
            .filter_map(|task| task.remote_id.clone())
            .collect();
        self.tasks.clear();
        self.preview = None;
        self.elapsed = ElapsedTimer::default();
        // Storage is erased through the effect, not rewritten.
        self.tasks_dirty = false;
        self.mark_dirty();
        effects.push(Effect::ClearRemoteHistory { remote_ids });
        effects.push(Effect::EraseStorage);
        effects
    }

    pub(crate) fn restore(&mut self, records: Vec<TaskRecord>, now: Timestamp) -> Vec<Effect> {
        let total = records.len();
        let mut effects = Vec::new();
        let mut resumed = Vec::new();
        let mut restored = 0usize;

        for record in records {
            if now.saturating_sub(record.timestamp) >= HISTORY_TTL_MS || self.contains(record.id) {
                continue;
            }
            // The id after the last one must stay representable.
            let Some(next_id) = record.id.checked_add(1) else {
                continue;
            };
            let task = restore_task(record);
            if task.is_polling() {
                let remote_id = task.remote_id.clone().unwrap_or_default();
                effects.push(Effect::StartPolling {
                    id: task.id,
                    remote_id: remote_id.clone(),
                });
                resumed.push(remote_id);
            }
            self.next_id = self.next_id.max(next_id);
            self.tasks.push(task);
            restored += 1;
        }

        if !resumed.is_empty() {
            effects.push(Effect::RefreshStatuses {
                remote_ids: resumed,
            });
        }
        if restored > 0 {
            self.mark_dirty();
        }
        if restored != total {
            // Pruned or duplicate records must disappear from storage too.
            self.tasks_dirty = true;
        }
        effects
    }

    pub(crate) fn preview_effect(&mut self, id: TaskId) -> Option<Effect> {
        let remote_id = self.completed_remote_id(id)?;
        Some(Effect::FetchPreview { id, remote_id })
    }

    pub(crate) fn download_effect(&mut self, id: TaskId) -> Option<Effect> {
        let remote_id = self.completed_remote_id(id)?;
        let file_name = markdown_file_name(&self.task(id)?.source.name);
        Some(Effect::Download {
            id,
            remote_id,
            file_name,
        })
    }

    fn completed_remote_id(&mut self, id: TaskId) -> Option<RemoteTaskId> {
        let task = self.task(id)?;
        if task.status == TaskStatus::Completed {
            if let Some(remote_id) = task.remote_id.clone() {
                return Some(remote_id);
            }
        }
        let text = format!("{} has no converted output yet", task.source.name);
        self.notify(NoticeLevel::Error, Some(id), text);
        None
    }

    pub(crate) fn show_preview(&mut self, id: TaskId, filename: String, content: String) {
        if !self.contains(id) {
            return;
        }
        self.preview = Some(PreviewView {
            task_id: id,
            filename,
            content,
        });
        self.mark_dirty();
    }

    pub(crate) fn tick(&mut self, now: Timestamp) {
        let converting = self.has_converting();
        match (converting, self.elapsed.started_at) {
            (true, None) => {
                self.elapsed.started_at = Some(now);
            }
            (false, Some(_)) => {
                // Keep the last reading on screen once everything settled.
                self.elapsed.started_at = None;
                return;
            }
            _ => {}
        }
        if let Some(started) = self.elapsed.started_at {
            let display = format_elapsed(now.saturating_sub(started));
            if display != self.elapsed.display {
                self.elapsed.display = display;
                self.mark_dirty();
            }
        }
    }

    pub(crate) fn request_quit(&mut self) -> Effect {
        if self.has_converting() {
            self.session = SessionState::ConfirmingQuit;
            self.mark_dirty();
            Effect::ConfirmQuit
        } else {
            self.shut_down()
        }
    }

    pub(crate) fn cancel_quit(&mut self) {
        if self.session == SessionState::ConfirmingQuit {
            self.session = SessionState::Active;
            self.mark_dirty();
        }
    }

    pub(crate) fn shut_down(&mut self) -> Effect {
        self.session = SessionState::ShuttingDown;
        self.mark_dirty();
        Effect::Shutdown
    }
}

fn restore_task(record: TaskRecord) -> ConversionTask {
    let remote_id = record.remote_id.filter(|id| !id.is_empty());
    let error = record.error.filter(|err| !err.is_empty());
    let mut task = ConversionTask {
        id: record.id,
        source: SourceFile {
            name: record.file_name,
            size: record.file_size,
            path: record.source_path,
        },
        status: record.status,
        progress: record.progress.min(100),
        remote_id,
        description: None,
        error: None,
        preview_url: None,
        download_url: None,
        completed_at: None,
    };

    match record.status {
        TaskStatus::Pending => {}
        TaskStatus::Converting => match (task.remote_id.is_some(), error) {
            (_, Some(err)) => task.fail(err),
            (false, None) => task.fail(UPLOAD_INTERRUPTED.to_string()),
            (true, None) => {}
        },
        TaskStatus::Completed => match task.remote_id.clone() {
            Some(remote_id) => {
                task.progress = 100;
                task.preview_url = record
                    .preview_url
                    .or_else(|| Some(default_preview_url(&remote_id)));
                task.download_url = record
                    .download_url
                    .or_else(|| Some(default_download_url(&remote_id)));
                task.completed_at = record.completed_at.or(Some(record.timestamp));
            }
            None => task.fail(GENERIC_FAILURE.to_string()),
        },
        TaskStatus::Error => task.fail(error.unwrap_or_else(|| GENERIC_FAILURE.to_string())),
    }
    task
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::markdown_file_name;

    #[test]
    fn last_extension_becomes_md() {
        assert_eq!(markdown_file_name("report.pdf"), "report.md");
        assert_eq!(markdown_file_name("archive.tar.gz"), "archive.tar.md");
    }

    #[test]
    fn names_without_extension_get_md_appended() {
        assert_eq!(markdown_file_name("README"), "README.md");
        assert_eq!(markdown_file_name("notes."), "notes..md");
        assert_eq!(markdown_file_name("dir.v2/file"), "dir.v2/file.md");
    }

    #[test]
    fn leading_dot_name_is_all_extension() {
        assert_eq!(markdown_file_name(".bashrc"), ".md");
    }
}
