//! Main application state and event loop

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::{
    config::Config,
    editor::LineEditor,
    recorder::{
        CpalSource, HttpUploader, Phase, RecorderController, RecorderError, Spectrum,
        UploadError, UploadJob, UploadOutcome, UploadProgress,
    },
    tasks::{Confirmation, HttpTaskApi, PendingSync, SyncOutcome, Task, TaskId, TaskSynchronizer},
    ui::{self, Mode, PreviewInfo, RenderState},
};

/// Messages that can be sent to the app from background tasks
#[derive(Debug)]
pub enum AppMessage {
    /// New visualizer frame
    Spectrum(Spectrum),
    /// Bytes sent so far for the active upload
    UploadProgress(UploadProgress),
    /// Upload request settled
    UploadFinished(Result<(), UploadError>),
    /// Task request settled
    Synced(SyncOutcome),
}

/// Application state
pub struct App {
    /// Terminal handle
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Record → preview → upload lifecycle
    recorder: RecorderController<CpalSource, HttpUploader>,
    /// Task list and its pending edits
    sync: TaskSynchronizer<HttpTaskApi>,
    /// What keys currently drive
    mode: Mode,
    /// Highlighted task
    selected: Option<TaskId>,
    /// Latest visualizer frame
    spectrum: Spectrum,
    /// App message receiver
    message_rx: mpsc::Receiver<AppMessage>,
    /// App message sender (shared)
    message_tx: mpsc::Sender<AppMessage>,
    /// Background refresh period
    poll_interval: Option<Duration>,
    /// Shown in the status bar
    server_url: String,
    /// Should quit
    should_quit: bool,
    /// Status message
    status_message: Option<String>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        // Create message channel
        let (message_tx, message_rx) = mpsc::channel(100);

        // HTTP clients; uploads may outlive the request timeout
        let api_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let upload_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;

        let frame_tx = message_tx.clone();
        let recorder = RecorderController::new(
            CpalSource::new(config.input_device.clone()),
            Arc::new(HttpUploader::new(upload_client, config.base_url())),
            preview_dir(),
            config.visualizer.clone(),
            Arc::new(move |frame: Spectrum| {
                // Dropping a frame is fine; the next one follows shortly
                let _ = frame_tx.try_send(AppMessage::Spectrum(frame));
            }),
        );
        let sync = TaskSynchronizer::new(Arc::new(HttpTaskApi::new(api_client, config.base_url())));

        // Set up terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            recorder,
            sync,
            mode: Mode::Normal,
            selected: None,
            spectrum: Vec::new(),
            message_rx,
            message_tx,
            poll_interval: config.poll_interval(),
            server_url: config.base_url().to_string(),
            should_quit: false,
            status_message: None,
        })
    }

    /// Main event loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Using backend {}", self.server_url);
        self.refresh();

        let mut poll = self.poll_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            // Draw UI
            self.draw()?;

            // Handle events with timeout
            tokio::select! {
                // Check for terminal events
                _ = tokio::time::sleep(Duration::from_millis(16)) => {
                    if event::poll(Duration::from_millis(0))? {
                        if let Event::Key(key) = event::read()? {
                            self.handle_key_event(key).await;
                        }
                    }
                }

                // Check for app messages
                Some(msg) = self.message_rx.recv() => {
                    self.handle_app_message(msg);
                }

                // Background refresh
                _ = next_tick(&mut poll) => {
                    tracing::debug!("Periodic refresh");
                    self.refresh();
                }
            }

            if self.should_quit {
                break;
            }
        }

        // Cleanup
        self.cleanup().await?;
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        // Extract state for rendering
        let state = RenderState {
            phase: self.recorder.phase(),
            elapsed: self.recorder.elapsed(),
            preview: self.recorder.preview().map(|p| PreviewInfo {
                path: p.path(),
                bytes: p.artifact().len(),
                duration: p.artifact().duration(),
            }),
            progress: self.recorder.progress(),
            spectrum: &self.spectrum,
            board: self.sync.view(),
            selected: self.selected.as_ref(),
            mode: &self.mode,
            status_message: self.status_message.as_deref(),
            server_url: &self.server_url,
        };

        self.terminal.draw(|frame| {
            ui::draw(frame, &state);
        })?;
        Ok(())
    }

    async fn handle_key_event(&mut self, key: KeyEvent) {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.handle_normal_mode_key(key).await,
            Mode::Renaming { id, editor } => self.handle_rename_key(key, id, editor),
            Mode::ConfirmDelete(id) => self.handle_confirm_key(key, id),
            // Any key dismisses an alert
            Mode::Alert(_) => {}
        }
    }

    async fn handle_normal_mode_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            // Quit
            (_, KeyCode::Char('q')) => {
                self.should_quit = true;
            }
            // Recording
            (_, KeyCode::Char('r')) => {
                self.toggle_recording().await;
            }
            (_, KeyCode::Char('u')) | (_, KeyCode::Enter) => {
                self.upload_preview();
            }
            (_, KeyCode::Char('x')) | (_, KeyCode::Esc) => {
                if self.recorder.phase() == Phase::Previewing {
                    self.recorder.discard();
                    self.status_message = Some("Recording discarded".to_string());
                }
            }
            // Tasks
            (_, KeyCode::Up) => self.move_selection(-1),
            (_, KeyCode::Down) => self.move_selection(1),
            (_, KeyCode::Char(' ')) => {
                let Some(task) = self.selected_task() else {
                    return;
                };
                let (id, done) = (task.id.clone(), !task.done);
                if let Some(pending) = self.sync.set_done(&id, done) {
                    self.spawn_sync(pending);
                }
            }
            (_, KeyCode::Char('e')) => {
                if let Some(task) = self.selected_task() {
                    self.mode = Mode::Renaming {
                        id: task.id.clone(),
                        editor: LineEditor::new(&task.content),
                    };
                }
            }
            (_, KeyCode::Char('d')) => {
                if let Some(task) = self.selected_task() {
                    self.mode = Mode::ConfirmDelete(task.id.clone());
                }
            }
            (_, KeyCode::Char('g')) | (_, KeyCode::F(5)) => {
                self.status_message = Some("Refreshing...".to_string());
                self.refresh();
            }
            _ => {}
        }
    }

    fn handle_rename_key(&mut self, key: KeyEvent, id: TaskId, mut editor: LineEditor) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => return,
            (_, KeyCode::Enter) => {
                if let Some(pending) = self.sync.rename(&id, editor.text()) {
                    self.spawn_sync(pending);
                }
                return;
            }
            (KeyModifiers::CONTROL, KeyCode::Char('w')) => editor.delete_word_backward(),
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => editor.delete_to_start(),
            (KeyModifiers::CONTROL, KeyCode::Char('k')) => editor.delete_to_end(),
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => editor.insert(c),
            (_, KeyCode::Backspace) => editor.backspace(),
            (_, KeyCode::Delete) => editor.delete(),
            (_, KeyCode::Left) => editor.left(),
            (_, KeyCode::Right) => editor.right(),
            (_, KeyCode::Home) => editor.home(),
            (_, KeyCode::End) => editor.end(),
            _ => {}
        }
        self.mode = Mode::Renaming { id, editor };
    }

    fn handle_confirm_key(&mut self, key: KeyEvent, id: TaskId) {
        let confirmation = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Confirmation::Confirmed,
            _ => Confirmation::Declined,
        };
        if let Some(pending) = self.sync.remove(&id, confirmation) {
            self.spawn_sync(pending);
        }
    }

    async fn toggle_recording(&mut self) {
        match self.recorder.phase() {
            Phase::Idle => match self.recorder.start().await {
                Ok(()) => self.status_message = Some("Recording...".to_string()),
                Err(e) => self.alert(e),
            },
            Phase::Recording => {
                let result = self.recorder.stop().await;
                self.spectrum.clear();
                match result {
                    Ok(()) => {
                        self.status_message =
                            Some("Press u to process or x to discard".to_string())
                    }
                    Err(e) => self.alert(e),
                }
            }
            Phase::Previewing | Phase::Uploading => {
                self.status_message = Some(RecorderError::Busy.to_string());
            }
        }
    }

    fn upload_preview(&mut self) {
        let tx = self.message_tx.clone();
        let on_progress = Arc::new(move |progress: UploadProgress| {
            let _ = tx.try_send(AppMessage::UploadProgress(progress));
        });

        if let Some(job) = self.recorder.process(on_progress) {
            self.status_message = Some("Uploading...".to_string());
            self.spawn_upload(job);
        }
    }

    fn spawn_upload(&self, job: UploadJob) {
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let result = job.await;
            let _ = tx.send(AppMessage::UploadFinished(result)).await;
        });
    }

    fn spawn_sync(&self, pending: PendingSync) {
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let outcome = pending.await;
            let _ = tx.send(AppMessage::Synced(outcome)).await;
        });
    }

    fn refresh(&mut self) {
        let pending = self.sync.fetch_all();
        self.spawn_sync(pending);
    }

    fn alert(&mut self, message: impl ToString) {
        self.mode = Mode::Alert(message.to_string());
    }

    fn selected_task(&self) -> Option<&Task> {
        self.selected.as_ref().and_then(|id| self.sync.board().find(id))
    }

    fn move_selection(&mut self, delta: isize) {
        let ids = self.sync.board().task_ids();
        if ids.is_empty() {
            self.selected = None;
            return;
        }

        let current = self
            .selected
            .as_ref()
            .and_then(|id| ids.iter().position(|i| i == id));
        let next = match current {
            Some(idx) => idx.saturating_add_signed(delta).min(ids.len() - 1),
            None => 0,
        };
        self.selected = Some(ids[next].clone());
    }

    /// Keep the selection pointing at a task that still exists
    fn fix_selection(&mut self) {
        let ids = self.sync.board().task_ids();
        let still_there = self
            .selected
            .as_ref()
            .is_some_and(|id| ids.contains(id));
        if !still_there {
            self.selected = ids.first().cloned();
        }
    }

    fn handle_app_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Spectrum(frame) => {
                // Late frames after stop are dropped
                if self.recorder.phase() == Phase::Recording {
                    self.spectrum = frame;
                }
            }
            AppMessage::UploadProgress(progress) => {
                self.recorder.report_progress(progress);
            }
            AppMessage::UploadFinished(result) => match self.recorder.finish_upload(result) {
                UploadOutcome::Uploaded => {
                    self.status_message =
                        Some("Uploaded. New tasks appear once processed".to_string());
                    self.refresh();
                }
                UploadOutcome::Failed(e) => {
                    self.status_message = None;
                    self.alert(e);
                }
            },
            AppMessage::Synced(outcome) => {
                let is_fetch = matches!(outcome, SyncOutcome::Fetched(_));
                let is_remove = matches!(outcome, SyncOutcome::Removed { .. });
                let refetch = outcome.needs_refetch();
                match self.sync.settle(outcome) {
                    Ok(()) if is_fetch => {
                        if self.status_message.as_deref() == Some("Refreshing...") {
                            self.status_message = None;
                        }
                    }
                    Ok(()) => {}
                    Err(e) if is_remove => self.alert(e),
                    Err(e) => self.status_message = Some(e.to_string()),
                }
                self.fix_selection();
                if refetch {
                    self.refresh();
                }
            }
        }
    }

    async fn cleanup(&mut self) -> Result<()> {
        // Stop capture and remove any preview file
        self.recorder.shutdown().await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Where preview files are written
fn preview_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Wait for the next refresh tick, or forever when polling is off
async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
