//! mdconvert core: pure conversion task tracker and view-model helpers.
//!
//! Nothing in here performs IO or reads a clock. Callers feed [`Msg`]s into
//! [`update`] and execute the returned [`Effect`]s.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{
    default_download_url, default_preview_url, markdown_file_name, AppState, RemoteState,
    RemoteTaskId, SessionState, SourceFile, StatusReport, TaskId, TaskRecord, TaskStatus,
    Timestamp, HISTORY_TTL_MS,
};
pub use update::update;
pub use view_model::{
    format_elapsed, AppViewModel, Notice, NoticeLevel, PreviewView, TaskRowView,
};
