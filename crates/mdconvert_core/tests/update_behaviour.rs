use std::collections::HashSet;
use std::sync::Once;

use mdconvert_core::{update, AppState, Effect, Msg, SessionState, SourceFile, TaskStatus};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(mdconvert_logging::initialize_for_tests);
}

fn file(name: &str) -> SourceFile {
    SourceFile::new(name, 10, format!("/tmp/{name}"))
}

fn add(state: AppState, names: &[&str]) -> AppState {
    let files = names.iter().map(|name| file(name)).collect();
    let (state, effects) = update(state, Msg::FilesAdded(files));
    assert!(effects.is_empty());
    state
}

#[test]
fn added_files_are_pending_with_unique_ids() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf", "b.docx"]);
    let mut state = add(state, &["c.png"]);
    let view = state.view();

    assert_eq!(view.task_count, 3);
    let ids: HashSet<_> = view.tasks.iter().map(|row| row.id).collect();
    assert_eq!(ids.len(), 3);
    assert!(view
        .tasks
        .iter()
        .all(|row| row.status == TaskStatus::Pending && row.progress == 0));
    let names: Vec<_> = view.tasks.iter().map(|row| row.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "b.docx", "c.png"]);
    assert!(state.consume_tasks_dirty());
}

#[test]
fn adding_nothing_leaves_state_clean() {
    init_logging();
    let (mut state, effects) = update(AppState::new(), Msg::FilesAdded(Vec::new()));
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    assert!(!state.consume_tasks_dirty());
}

#[test]
fn submit_moves_every_pending_task_to_converting() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf", "b.pdf"]);
    let (state, effects) = update(state, Msg::SubmitClicked);

    assert_eq!(
        effects,
        vec![
            Effect::Upload {
                id: 1,
                source: file("a.pdf"),
            },
            Effect::Upload {
                id: 2,
                source: file("b.pdf"),
            },
        ]
    );
    assert!(state
        .view()
        .tasks
        .iter()
        .all(|row| row.status == TaskStatus::Converting && row.progress == 0));

    // Nothing left pending, so a second submit is a no-op.
    let (_state, effects) = update(state, Msg::SubmitClicked);
    assert!(effects.is_empty());
}

#[test]
fn submit_resolves_each_task_independently() {
    init_logging();
    let state = add(AppState::new(), &["bad.pdf", "good.pdf"]);
    let (state, _) = update(state, Msg::SubmitClicked);

    let (state, effects) = update(
        state,
        Msg::SubmitFailed {
            id: 1,
            message: "network unreachable".to_string(),
        },
    );
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::SubmitSucceeded {
            id: 2,
            remote_id: "remote-2".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::StartPolling {
            id: 2,
            remote_id: "remote-2".to_string(),
        }]
    );

    let view = state.view();
    let bad = view.task(1).unwrap();
    assert_eq!(bad.status, TaskStatus::Error);
    assert_eq!(bad.error.as_deref(), Some("network unreachable"));
    assert_eq!(bad.remote_id, None);

    let good = view.task(2).unwrap();
    assert_eq!(good.status, TaskStatus::Converting);
    assert_eq!(good.remote_id.as_deref(), Some("remote-2"));
    assert_eq!(good.error, None);
}

#[test]
fn remote_id_is_set_only_once() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, _) = update(state, Msg::SubmitClicked);
    let (state, _) = update(
        state,
        Msg::SubmitSucceeded {
            id: 1,
            remote_id: "first".to_string(),
        },
    );
    let (state, effects) = update(
        state,
        Msg::SubmitSucceeded {
            id: 1,
            remote_id: "second".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.view().task(1).unwrap().remote_id.as_deref(), Some("first"));
}

#[test]
fn empty_submit_failure_message_falls_back_to_generic_text() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, _) = update(state, Msg::SubmitClicked);
    let (state, _) = update(
        state,
        Msg::SubmitFailed {
            id: 1,
            message: "  ".to_string(),
        },
    );

    assert_eq!(
        state.view().task(1).unwrap().error.as_deref(),
        Some("Conversion failed")
    );
}

#[test]
fn retry_of_unknown_id_is_noop() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (next, effects) = update(state.clone(), Msg::RetryClicked { id: 42 });

    assert!(effects.is_empty());
    assert_eq!(next, state);
}

#[test]
fn retry_of_failed_task_clears_error_and_resubmits_only_that_task() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, _) = update(state, Msg::SubmitClicked);
    let (state, _) = update(
        state,
        Msg::SubmitFailed {
            id: 1,
            message: "boom".to_string(),
        },
    );
    let state = add(state, &["b.pdf"]);

    let (state, effects) = update(state, Msg::RetryClicked { id: 1 });

    assert_eq!(
        effects,
        vec![Effect::Upload {
            id: 1,
            source: file("a.pdf"),
        }]
    );
    let view = state.view();
    let retried = view.task(1).unwrap();
    assert_eq!(retried.status, TaskStatus::Converting);
    assert_eq!(retried.error, None);
    assert_eq!(view.task(2).unwrap().status, TaskStatus::Pending);
}

#[test]
fn retry_ignores_tasks_that_are_not_failed() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, _) = update(state, Msg::SubmitClicked);
    let (next, effects) = update(state.clone(), Msg::RetryClicked { id: 1 });

    assert!(effects.is_empty());
    assert_eq!(next.view().tasks, state.view().tasks);
}

#[test]
fn remove_only_drops_pending_tasks() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf", "b.pdf"]);
    let (state, _) = update(state, Msg::RemoveClicked { id: 1 });
    assert_eq!(state.view().task_count, 1);

    let (state, _) = update(state, Msg::SubmitClicked);
    let (state, _) = update(state, Msg::RemoveClicked { id: 2 });
    assert_eq!(state.view().task_count, 1);
    assert_eq!(state.view().task(2).unwrap().status, TaskStatus::Converting);
}

#[test]
fn clear_history_empties_list_and_reports_remote_ids() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf", "b.pdf", "c.pdf"]);
    let (state, _) = update(state, Msg::SubmitClicked);
    let (state, _) = update(
        state,
        Msg::SubmitSucceeded {
            id: 1,
            remote_id: "r1".to_string(),
        },
    );
    let (state, _) = update(
        state,
        Msg::SubmitFailed {
            id: 2,
            message: "nope".to_string(),
        },
    );

    let (mut state, effects) = update(state, Msg::ClearHistoryClicked);

    assert_eq!(
        effects,
        vec![
            Effect::StopPolling { id: 1 },
            Effect::ClearRemoteHistory {
                remote_ids: vec!["r1".to_string()],
            },
            Effect::EraseStorage,
        ]
    );
    assert_eq!(state.view().task_count, 0);
    assert!(state.is_settled());
    assert!(!state.consume_tasks_dirty());
}

#[test]
fn clear_history_on_empty_list_still_issues_remote_clear() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::ClearHistoryClicked);

    assert_eq!(
        effects,
        vec![
            Effect::ClearRemoteHistory {
                remote_ids: Vec::new(),
            },
            Effect::EraseStorage,
        ]
    );
    assert_eq!(state.view().task_count, 0);
}

#[test]
fn ids_stay_unique_after_clear() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, _) = update(state, Msg::ClearHistoryClicked);
    let state = add(state, &["b.pdf"]);

    assert_eq!(state.view().tasks[0].id, 2);
}

#[test]
fn clear_history_failure_becomes_a_notice() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::ClearHistoryFailed {
            message: "http status 500".to_string(),
        },
    );

    let notice = state.view().notice.expect("notice");
    assert!(notice.text.contains("http status 500"));
}

#[test]
fn quit_without_conversions_shuts_down_immediately() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, effects) = update(state, Msg::QuitRequested);

    assert_eq!(effects, vec![Effect::Shutdown]);
    assert_eq!(state.session(), SessionState::ShuttingDown);
}

#[test]
fn quit_while_converting_requires_confirmation() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, _) = update(state, Msg::SubmitClicked);

    let (state, effects) = update(state, Msg::QuitRequested);
    assert_eq!(effects, vec![Effect::ConfirmQuit]);
    assert_eq!(state.session(), SessionState::ConfirmingQuit);

    let (state, effects) = update(state, Msg::QuitCancelled);
    assert!(effects.is_empty());
    assert_eq!(state.session(), SessionState::Active);

    let (state, _) = update(state, Msg::QuitRequested);
    let (state, effects) = update(state, Msg::QuitConfirmed);
    assert_eq!(effects, vec![Effect::Shutdown]);
    assert_eq!(state.session(), SessionState::ShuttingDown);
}

#[test]
fn no_new_submissions_once_shutting_down() {
    init_logging();
    let state = add(AppState::new(), &["a.pdf"]);
    let (state, _) = update(state, Msg::QuitConfirmed);
    let (state, effects) = update(state, Msg::SubmitClicked);

    assert!(effects.is_empty());
    assert_eq!(state.view().task(1).unwrap().status, TaskStatus::Pending);
}
