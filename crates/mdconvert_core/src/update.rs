use crate::view_model::NoticeLevel;
use crate::{AppState, Effect, Msg, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let accepting_input = state.session() != SessionState::ShuttingDown;

    let effects = match msg {
        Msg::FilesAdded(files) => {
            if accepting_input {
                state.add_files(files);
            }
            Vec::new()
        }
        Msg::SubmitClicked => {
            if accepting_input {
                state.submit_pending()
            } else {
                Vec::new()
            }
        }
        Msg::RetryClicked { id } => {
            if accepting_input {
                state.retry(id).into_iter().collect()
            } else {
                Vec::new()
            }
        }
        Msg::RemoveClicked { id } => {
            state.remove_pending(id);
            Vec::new()
        }
        Msg::ClearHistoryClicked => state.clear_history(),
        Msg::PreviewRequested { id } => state.preview_effect(id).into_iter().collect(),
        Msg::DownloadRequested { id } => state.download_effect(id).into_iter().collect(),
        Msg::RestoreFromStorage { records, now } => state.restore(records, now),
        Msg::SubmitSucceeded { id, remote_id } => {
            state.apply_submitted(id, remote_id).into_iter().collect()
        }
        Msg::SubmitFailed { id, message } => {
            state.apply_submit_failed(id, message);
            Vec::new()
        }
        Msg::StatusPolled { id, report, now } => {
            state.apply_status(id, report, now).into_iter().collect()
        }
        Msg::PollFailed { id, message } => state.apply_poll_failed(id, message).into_iter().collect(),
        Msg::BatchStatusReceived { entries, now } => state.apply_batch(entries, now),
        Msg::ClearHistoryFailed { message } => {
            state.notify(
                NoticeLevel::Error,
                None,
                format!("failed to clear remote history: {message}"),
            );
            Vec::new()
        }
        Msg::PreviewLoaded {
            id,
            filename,
            content,
        } => {
            state.show_preview(id, filename, content);
            Vec::new()
        }
        Msg::PreviewFailed { id, message } => {
            state.notify(
                NoticeLevel::Error,
                Some(id),
                format!("preview failed: {message}"),
            );
            Vec::new()
        }
        Msg::DownloadSaved { id, path } => {
            state.notify(
                NoticeLevel::Info,
                Some(id),
                format!("saved {}", path.display()),
            );
            Vec::new()
        }
        Msg::DownloadFailed { id, message } => {
            state.notify(
                NoticeLevel::Error,
                Some(id),
                format!("download failed: {message}"),
            );
            Vec::new()
        }
        Msg::Tick { now } => {
            state.tick(now);
            Vec::new()
        }
        Msg::QuitRequested => match state.session() {
            SessionState::Active => vec![state.request_quit()],
            SessionState::ConfirmingQuit | SessionState::ShuttingDown => Vec::new(),
        },
        Msg::QuitConfirmed => {
            if state.session() == SessionState::ShuttingDown {
                Vec::new()
            } else {
                vec![state.shut_down()]
            }
        }
        Msg::QuitCancelled => {
            state.cancel_quit();
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
