use std::collections::HashMap;
use std::io::Write;

use mdconvert_core::{AppViewModel, NoticeLevel, TaskId, TaskRowView, TaskStatus};

/// Prints view-model changes as plain lines: a task line whenever that task
/// changed, every new notice once, and each preview once.
pub struct TerminalRenderer<W: Write> {
    out: W,
    rows: HashMap<TaskId, String>,
    last_notice: u64,
    last_preview: Option<TaskId>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rows: HashMap::new(),
            last_notice: 0,
            last_preview: None,
        }
    }

    /// Marks the rows of `view` as already shown, so only later changes print.
    pub fn prime(&mut self, view: &AppViewModel) {
        self.rows = view
            .tasks
            .iter()
            .map(|row| (row.id, format_task_row(row)))
            .collect();
        self.last_notice = view.notice.as_ref().map_or(0, |notice| notice.seq);
    }

    pub fn observe(&mut self, view: &AppViewModel) {
        let lines = self.changes(view);
        for line in lines {
            let _ = writeln!(self.out, "{line}");
        }
        let _ = self.out.flush();
    }

    fn changes(&mut self, view: &AppViewModel) -> Vec<String> {
        let mut lines = Vec::new();

        for row in &view.tasks {
            let text = format_task_row(row);
            if self.rows.get(&row.id) != Some(&text) {
                lines.push(text.clone());
                self.rows.insert(row.id, text);
            }
        }
        self.rows
            .retain(|id, _| view.tasks.iter().any(|row| row.id == *id));

        if let Some(notice) = &view.notice {
            if notice.seq > self.last_notice {
                self.last_notice = notice.seq;
                let prefix = match notice.level {
                    NoticeLevel::Info => "note",
                    NoticeLevel::Error => "error",
                };
                lines.push(format!("{prefix}: {}", notice.text));
            }
        }

        match &view.preview {
            Some(preview) if self.last_preview != Some(preview.task_id) => {
                self.last_preview = Some(preview.task_id);
                lines.push(format!("----- {} -----", preview.filename));
                lines.push(preview.content.clone());
                lines.push("-----".to_string());
            }
            _ => {}
        }

        lines
    }
}

/// Full task table, used by `status`.
pub fn render_task_list(view: &AppViewModel) -> Vec<String> {
    if view.tasks.is_empty() {
        return vec!["No conversion tasks.".to_string()];
    }
    let mut lines: Vec<String> = view.tasks.iter().map(format_task_row).collect();
    lines.push(format!(
        "{} tasks: {} pending, {} converting, {} completed, {} failed | elapsed {}",
        view.task_count,
        view.pending_count,
        view.converting_count,
        view.completed_count,
        view.error_count,
        view.elapsed
    ));
    lines
}

pub fn format_task_row(row: &TaskRowView) -> String {
    let head = format!(
        "[#{id}] {status:<10} {progress:>3}%  {name} ({size})",
        id = row.id,
        status = status_label(row.status),
        progress = row.progress,
        name = row.file_name,
        size = format_size(row.file_size),
    );
    let detail = match row.status {
        TaskStatus::Error => row.error.as_deref(),
        TaskStatus::Converting => row.description.as_deref(),
        TaskStatus::Completed => row.download_url.as_deref(),
        TaskStatus::Pending => None,
    };
    match detail {
        Some(detail) if !detail.is_empty() => format!("{head} - {detail}"),
        _ => head,
    }
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Converting => "Converting",
        TaskStatus::Completed => "Completed",
        TaskStatus::Error => "Error",
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use mdconvert_core::{AppViewModel, Notice, NoticeLevel, TaskRowView, TaskStatus};

    use super::{format_size, format_task_row, render_task_list, TerminalRenderer};

    fn row(id: u64, status: TaskStatus, progress: u8) -> TaskRowView {
        TaskRowView {
            id,
            file_name: "report.pdf".to_string(),
            file_size: 1536,
            status,
            progress,
            remote_id: None,
            description: None,
            error: None,
            preview_url: None,
            download_url: None,
            completed_at: None,
        }
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn error_rows_show_the_message() {
        let mut failed = row(3, TaskStatus::Error, 20);
        failed.error = Some("corrupt file".to_string());
        assert_eq!(
            format_task_row(&failed),
            "[#3] Error       20%  report.pdf (1.5 KB) - corrupt file"
        );
    }

    #[test]
    fn empty_list_has_placeholder() {
        assert_eq!(
            render_task_list(&AppViewModel::default()),
            vec!["No conversion tasks.".to_string()]
        );
    }

    #[test]
    fn renderer_prints_only_changes() {
        let mut out = Vec::new();
        {
            let mut renderer = TerminalRenderer::new(&mut out);
            let mut view = AppViewModel {
                tasks: vec![row(1, TaskStatus::Converting, 30), row(2, TaskStatus::Pending, 0)],
                ..AppViewModel::default()
            };
            renderer.observe(&view);
            view.tasks[0].progress = 70;
            view.notice = Some(Notice {
                seq: 1,
                level: NoticeLevel::Error,
                task_id: None,
                text: "failed to clear remote history: boom".to_string(),
            });
            renderer.observe(&view);
            renderer.observe(&view);
        }
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains(" 70%"));
        assert_eq!(lines[3], "error: failed to clear remote history: boom");
    }
}
