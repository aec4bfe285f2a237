//! Background session worker: owns the tokio runtime and the presenter, driven over channels.

use std::sync::mpsc;

use eframe::egui;
use relay::context::AppContext;
use relay::presenter::{MessageRow, SessionPresenter};
use tokio_util::sync::CancellationToken;

pub enum Command {
    Send(String),
    /// Drop the thread and start a fresh conversation.
    Reset,
}

pub enum Event {
    Ready {
        assistant_id: String,
        specialist_id: Option<String>,
    },
    Rows(Vec<MessageRow>),
    Reset,
    /// A send or reset failed; the session stays usable.
    Failed(String),
    /// The session could not be loaded; the worker has stopped.
    Fatal(String),
}

/// Handle held by the UI. Dropping it cancels any in-flight run wait and stops the worker.
pub struct SessionWorker {
    commands: mpsc::Sender<Command>,
    events: mpsc::Receiver<Event>,
    cancel: CancellationToken,
}

impl SessionWorker {
    pub fn spawn(app: AppContext, repaint: egui::Context) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (ev_tx, ev_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        std::thread::spawn(move || run(app, token, cmd_rx, ev_tx, repaint));
        Self {
            commands: cmd_tx,
            events: ev_rx,
            cancel,
        }
    }

    /// False when the worker is gone.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.events.try_recv().ok()
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn run(
    app: AppContext,
    cancel: CancellationToken,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
    repaint: egui::Context,
) {
    let emit = |event: Event| {
        let _ = events.send(event);
        repaint.request_repaint();
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            emit(Event::Fatal(format!("failed to start runtime: {}", e)));
            return;
        }
    };
    let orchestrator = match app.build_orchestrator_with(app.poll_policy().with_cancel(cancel)) {
        Ok(o) => o,
        Err(e) => {
            log::error!("worker: {}", e);
            emit(Event::Fatal(e.to_string()));
            return;
        }
    };
    let mut presenter = SessionPresenter::new(orchestrator);
    if let Err(e) = runtime.block_on(presenter.load()) {
        log::error!("worker: loading session failed: {}", e);
        emit(Event::Fatal(e.to_string()));
        return;
    }
    emit(ready_event(&presenter));

    while let Ok(command) = commands.recv() {
        match command {
            Command::Send(text) => match runtime.block_on(presenter.send(&text)) {
                Ok(rows) => emit(Event::Rows(rows)),
                Err(e) => {
                    log::warn!("worker: send failed: {}", e);
                    emit(Event::Failed(e.to_string()));
                }
            },
            Command::Reset => match runtime.block_on(presenter.reset()) {
                Ok(()) => {
                    emit(Event::Reset);
                    emit(ready_event(&presenter));
                }
                Err(e) => {
                    log::warn!("worker: reset failed: {}", e);
                    emit(Event::Failed(e.to_string()));
                }
            },
        }
    }
    presenter.unload();
    log::debug!("worker: stopped");
}

fn ready_event(presenter: &SessionPresenter) -> Event {
    let orchestrator = presenter.orchestrator();
    Event::Ready {
        assistant_id: orchestrator.assistant_id().unwrap_or_default().to_string(),
        specialist_id: orchestrator
            .specialist()
            .and_then(|s| s.assistant_id())
            .map(str::to_string),
    }
}
