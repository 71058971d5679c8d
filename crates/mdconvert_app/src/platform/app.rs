use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use mdconvert_core::{
    update, AppState, AppViewModel, Effect, Msg, SessionState, SourceFile, TaskId, TaskStatus,
    Timestamp,
};
use mdconvert_engine::{
    ensure_dir, load_or_create_device_id, ApiSettings, EngineConfig, EngineEvent, EngineHandle,
    HttpConversionApi, PollSettings,
};
use mdconvert_logging::{convert_debug, convert_info};
use tokio::time::MissedTickBehavior;

use super::cli::{Cli, Command};
use super::effects::EffectRunner;
use super::logging;
use super::persistence::StateStore;
use super::ui::{prompt, render};

const TICK_INTERVAL: Duration = Duration::from_millis(250);

type Observer = Box<dyn FnMut(&AppViewModel)>;
type QuitPrompt = Box<dyn FnMut() -> bool>;

/// What [`Tracker::run`] waits for before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    /// Only the answers to one-shot requests (preview, download, clear, batch status).
    Replies,
    /// Additionally until no task is converting.
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Settled,
    /// The user quit, or the engine went away.
    Stopped,
}

enum Wake {
    Engine(EngineEvent),
    Tick,
    Interrupt,
    Closed,
}

/// Owns the canonical tracker state. Every message goes through
/// [`Tracker::dispatch`]; observers see the view model after each change.
pub struct Tracker {
    state: AppState,
    runner: EffectRunner,
    store: StateStore,
    observers: Vec<Observer>,
    confirm_quit: QuitPrompt,
    watch_interrupts: bool,
}

impl Tracker {
    pub fn new(
        runner: EffectRunner,
        store: StateStore,
        confirm_quit: impl FnMut() -> bool + 'static,
    ) -> Self {
        Self {
            state: AppState::new(),
            runner,
            store,
            observers: Vec::new(),
            confirm_quit: Box::new(confirm_quit),
            watch_interrupts: false,
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&AppViewModel) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Treat Ctrl-C during [`Tracker::run`] as a quit request.
    pub fn watch_interrupts(&mut self, enabled: bool) {
        self.watch_interrupts = enabled;
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    /// Loads the persisted task list. Call once, before anything else.
    pub fn restore(&mut self) {
        let records = self.store.load();
        self.dispatch(Msg::RestoreFromStorage {
            records,
            now: now_ms(),
        });
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (mut state, effects) = update(state, msg);
            let changed = state.consume_dirty();
            let tasks_changed = state.consume_tasks_dirty();
            self.state = state;

            if tasks_changed {
                self.persist();
            }
            if changed {
                let view = self.state.view();
                for observer in &mut self.observers {
                    observer(&view);
                }
            }

            for effect in effects {
                let Some(local) = self.runner.run(effect) else {
                    continue;
                };
                match local {
                    Effect::EraseStorage => self.store.erase(),
                    Effect::ConfirmQuit => {
                        let answer = if (self.confirm_quit)() {
                            Msg::QuitConfirmed
                        } else {
                            Msg::QuitCancelled
                        };
                        queue.push_back(answer);
                    }
                    Effect::Shutdown => {
                        // Converting tasks resume polling on the next run.
                        self.persist();
                        convert_info!("Shut down with {} tasks", self.state.task_count());
                    }
                    other => convert_debug!("Unhandled local effect {:?}", other),
                }
            }
        }
    }

    /// Feeds engine events and clock ticks into the tracker until `wait`
    /// is satisfied or the session shuts down.
    pub async fn run(&mut self, wait: WaitFor) -> RunOutcome {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.state.session() == SessionState::ShuttingDown {
                return RunOutcome::Stopped;
            }
            let converting = wait == WaitFor::Settled && self.state.has_converting();
            if !converting && self.runner.awaiting_replies() == 0 {
                return RunOutcome::Settled;
            }

            let watch = self.watch_interrupts;
            let wake = tokio::select! {
                event = self.runner.next_event() => event.map_or(Wake::Closed, Wake::Engine),
                _ = ticker.tick() => Wake::Tick,
                _ = interrupted(watch) => Wake::Interrupt,
            };

            match wake {
                Wake::Engine(event) => {
                    let msg = self.runner.translate(event, now_ms());
                    self.dispatch(msg);
                }
                Wake::Tick => self.dispatch(Msg::Tick { now: now_ms() }),
                Wake::Interrupt => self.dispatch(Msg::QuitRequested),
                Wake::Closed => return RunOutcome::Stopped,
            }
        }
    }

    fn persist(&mut self) {
        let records = self.state.task_records(now_ms());
        self.store.save(&records);
    }
}

async fn interrupted(enabled: bool) {
    if enabled && tokio::signal::ctrl_c().await.is_ok() {
        return;
    }
    std::future::pending::<()>().await
}

fn now_ms() -> Timestamp {
    Utc::now().timestamp_millis()
}

pub async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log_destination(), cli.log_level());

    ensure_dir(&cli.state_dir)
        .with_context(|| format!("cannot use state directory {}", cli.state_dir.display()))?;
    let device_id =
        load_or_create_device_id(&cli.state_dir).context("cannot create the device identifier")?;
    let api = HttpConversionApi::new(ApiSettings {
        base_url: cli.server.clone(),
        ..ApiSettings::default()
    })
    .with_context(|| format!("invalid server url {}", cli.server))?;
    let engine = EngineHandle::new(
        Arc::new(api),
        EngineConfig {
            device_id,
            poll: PollSettings {
                interval: cli.poll_interval(),
            },
            output_dir: cli.output.clone(),
        },
    );

    let mut tracker = Tracker::new(
        EffectRunner::new(engine),
        StateStore::new(cli.state_dir.clone()),
        prompt::confirm_quit,
    );
    tracker.watch_interrupts(true);
    tracker.restore();

    let mut renderer = render::TerminalRenderer::new(io::stdout());
    renderer.prime(&tracker.view());
    tracker.subscribe(move |view| renderer.observe(view));

    let outcome = match cli.command {
        Command::Convert { files, download } => convert(&mut tracker, &files, download).await?,
        Command::Status { wait } => {
            let outcome = tracker
                .run(if wait { WaitFor::Settled } else { WaitFor::Replies })
                .await;
            for line in render::render_task_list(&tracker.view()) {
                println!("{line}");
            }
            outcome
        }
        Command::Retry { id } => {
            require_task(&tracker, id, &[TaskStatus::Error])?;
            tracker.dispatch(Msg::RetryClicked { id });
            tracker.run(WaitFor::Settled).await
        }
        Command::Remove { id } => {
            require_task(&tracker, id, &[TaskStatus::Pending])?;
            tracker.dispatch(Msg::RemoveClicked { id });
            println!("Removed task #{id}.");
            RunOutcome::Settled
        }
        Command::Clear => {
            tracker.dispatch(Msg::ClearHistoryClicked);
            let outcome = tracker.run(WaitFor::Replies).await;
            println!("History cleared.");
            outcome
        }
        Command::Preview { id } => {
            require_task(&tracker, id, &[TaskStatus::Completed])?;
            tracker.dispatch(Msg::PreviewRequested { id });
            tracker.run(WaitFor::Replies).await
        }
        Command::Download { id } => {
            require_task(&tracker, id, &[TaskStatus::Completed])?;
            tracker.dispatch(Msg::DownloadRequested { id });
            tracker.run(WaitFor::Replies).await
        }
    };

    if outcome == RunOutcome::Stopped {
        println!("Stopped. Unfinished conversions resume on the next run.");
    }
    Ok(())
}

async fn convert(tracker: &mut Tracker, files: &[PathBuf], download: bool) -> Result<RunOutcome> {
    let sources = files
        .iter()
        .map(|path| source_file(path))
        .collect::<Result<Vec<_>>>()?;

    let known: HashSet<TaskId> = tracker.view().tasks.iter().map(|row| row.id).collect();
    tracker.dispatch(Msg::FilesAdded(sources));
    let added: Vec<TaskId> = tracker
        .view()
        .tasks
        .iter()
        .map(|row| row.id)
        .filter(|id| !known.contains(id))
        .collect();

    tracker.dispatch(Msg::SubmitClicked);
    let mut outcome = tracker.run(WaitFor::Settled).await;
    if outcome == RunOutcome::Stopped {
        return Ok(outcome);
    }

    let view = tracker.view();
    if download {
        for id in &added {
            if view.task(*id).is_some_and(|row| row.status == TaskStatus::Completed) {
                tracker.dispatch(Msg::DownloadRequested { id: *id });
            }
        }
        outcome = tracker.run(WaitFor::Replies).await;
    }

    let failed = added
        .iter()
        .filter(|id| view.task(**id).is_some_and(|row| row.status == TaskStatus::Error))
        .count();
    if failed > 0 {
        bail!("{failed} of {} conversions failed", added.len());
    }
    Ok(outcome)
}

fn source_file(path: &Path) -> Result<SourceFile> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a file", path.display());
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    // Stored with the task, so a later run can upload it again from anywhere.
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Ok(SourceFile::new(name, metadata.len(), path))
}

fn require_task(tracker: &Tracker, id: TaskId, allowed: &[TaskStatus]) -> Result<()> {
    let view = tracker.view();
    let Some(row) = view.task(id) else {
        bail!("no task #{id}; run `mdconvert status` to list tasks");
    };
    if !allowed.contains(&row.status) {
        bail!(
            "task #{id} is {}; this needs a task that is {}",
            row.status.as_str(),
            allowed
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<_>>()
                .join(" or ")
        );
    }
    Ok(())
}
