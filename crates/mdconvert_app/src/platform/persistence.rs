use std::fs;
use std::path::PathBuf;

use mdconvert_core::{TaskRecord, TaskStatus};
use mdconvert_engine::AtomicFileWriter;
use mdconvert_logging::{convert_error, convert_info, convert_warn};
use serde::{Deserialize, Serialize};

pub(crate) const STATE_FILENAME: &str = "mdconvert_state.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedTask {
    id: u64,
    file_name: String,
    file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_path: Option<PathBuf>,
    /// Remote task id; empty until the upload was accepted.
    #[serde(default)]
    task_id: String,
    status: String,
    #[serde(default)]
    progress: u8,
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    tasks: Vec<PersistedTask>,
}

impl From<&TaskRecord> for PersistedTask {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name.clone(),
            file_size: record.file_size,
            source_path: record.source_path.clone(),
            task_id: record.remote_id.clone().unwrap_or_default(),
            status: record.status.as_str().to_string(),
            progress: record.progress,
            timestamp: record.timestamp,
            preview_url: record.preview_url.clone(),
            download_url: record.download_url.clone(),
            error: record.error.clone(),
            completed_at: record.completed_at,
        }
    }
}

impl PersistedTask {
    fn into_record(self) -> Option<TaskRecord> {
        let status = TaskStatus::parse(&self.status)?;
        Some(TaskRecord {
            id: self.id,
            file_name: self.file_name,
            file_size: self.file_size,
            source_path: self.source_path,
            remote_id: Some(self.task_id).filter(|id| !id.is_empty()),
            status,
            progress: self.progress,
            timestamp: self.timestamp,
            preview_url: self.preview_url,
            download_url: self.download_url,
            error: self.error,
            completed_at: self.completed_at,
        })
    }
}

/// The task list on disk. Failures are logged and never reach the tracker.
pub(crate) struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub(crate) fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILENAME)
    }

    pub(crate) fn load(&self) -> Vec<TaskRecord> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Vec::new();
            }
            Err(err) => {
                convert_warn!("Failed to read persisted state from {:?}: {}", path, err);
                return Vec::new();
            }
        };

        let state: PersistedState = match ron::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                convert_warn!("Failed to parse persisted state from {:?}: {}", path, err);
                return Vec::new();
            }
        };

        let records: Vec<TaskRecord> = state
            .tasks
            .into_iter()
            .filter_map(|task| {
                let status = task.status.clone();
                let record = task.into_record();
                if record.is_none() {
                    convert_warn!("Skipping persisted task with unknown status {:?}", status);
                }
                record
            })
            .collect();

        convert_info!("Loaded {} persisted tasks from {:?}", records.len(), path);
        records
    }

    pub(crate) fn save(&self, records: &[TaskRecord]) {
        if records.is_empty() {
            self.erase();
            return;
        }

        let state = PersistedState {
            tasks: records.iter().map(PersistedTask::from).collect(),
        };

        let pretty = ron::ser::PrettyConfig::new();
        let content = match ron::ser::to_string_pretty(&state, pretty) {
            Ok(text) => text,
            Err(err) => {
                convert_error!("Failed to serialize persisted state: {}", err);
                return;
            }
        };

        let writer = AtomicFileWriter::new(self.dir.clone());
        if let Err(err) = writer.write(STATE_FILENAME, &content) {
            convert_error!("Failed to write persisted state to {:?}: {}", self.dir, err);
        }
    }

    pub(crate) fn erase(&self) {
        let writer = AtomicFileWriter::new(self.dir.clone());
        match writer.remove(STATE_FILENAME) {
            Ok(true) => convert_info!("Erased persisted state in {:?}", self.dir),
            Ok(false) => {}
            Err(err) => convert_error!("Failed to erase persisted state in {:?}: {}", self.dir, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use mdconvert_core::{TaskRecord, TaskStatus};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::{StateStore, STATE_FILENAME};

    fn record(id: u64, status: TaskStatus, remote_id: Option<&str>) -> TaskRecord {
        TaskRecord {
            id,
            file_name: format!("doc{id}.pdf"),
            file_size: 2048,
            source_path: Some(PathBuf::from(format!("/docs/doc{id}.pdf"))),
            remote_id: remote_id.map(str::to_string),
            status,
            progress: 40,
            timestamp: 1_700_000_000_000,
            preview_url: None,
            download_url: None,
            error: None,
            completed_at: None,
        }
    }

    #[test]
    fn saved_records_load_back() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        let mut done = record(2, TaskStatus::Completed, Some("r2"));
        done.progress = 100;
        done.completed_at = Some(1_700_000_000_500);
        done.preview_url = Some("/api/convert/r2/preview".to_string());
        let records = vec![record(1, TaskStatus::Converting, Some("r1")), done];

        store.save(&records);

        assert_eq!(store.load(), records);
    }

    #[test]
    fn file_uses_camel_case_layout() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());

        store.save(&[record(1, TaskStatus::Pending, None)]);

        let text = fs::read_to_string(temp.path().join(STATE_FILENAME)).unwrap();
        assert!(text.contains("fileName"));
        assert!(text.contains("taskId: \"\""));
        assert!(text.contains("status: \"pending\""));
        assert!(text.contains("sourcePath: Some(\"/docs/doc1.pdf\")"));
        assert!(!text.contains("completedAt"));
    }

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        assert!(store.load().is_empty());

        fs::write(store.path(), "not ron at all {").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn unknown_status_is_skipped() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        store.save(&[
            record(1, TaskStatus::Pending, None),
            record(2, TaskStatus::Error, Some("r2")),
        ]);
        let text = fs::read_to_string(store.path())
            .unwrap()
            .replace("\"error\"", "\"exploded\"");
        fs::write(store.path(), text).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 1);
    }

    #[test]
    fn empty_list_and_erase_remove_the_file() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        store.save(&[record(1, TaskStatus::Pending, None)]);
        assert!(store.path().exists());

        store.save(&[]);
        assert!(!store.path().exists());

        store.save(&[record(1, TaskStatus::Pending, None)]);
        store.erase();
        assert!(!store.path().exists());
    }
}
