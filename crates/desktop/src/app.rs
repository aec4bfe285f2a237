//! Relay Desktop: egui app state and UI.

use eframe::egui;
use relay::assistants::MessageRole;
use relay::config::{self, Config};
use relay::context::AppContext;
use relay::position::{PositionStore, WindowPosition};
use relay::presenter::MessageRow;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use crate::worker::{Command, Event, SessionWorker};

const CHAT_INPUT_HEIGHT: f32 = 110.0;
const CHAT_MESSAGES_MIN_HEIGHT: f32 = 80.0;
const LOG_BUFFER_MAX_LINES: usize = 2000;
const HELP_TEXT: &str = "available commands:\n\n/new - start a new conversation\n/help - show this help message";

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        // reqwest/hyper internals are noise on the Logs screen
        metadata.target().starts_with("relay") || metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

/// Install the Logs screen logger. Call once, before anything logs.
pub fn install_logger() {
    let _ = log_buffer();
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Debug);
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Chat,
    Info,
    Logs,
}

enum Connection {
    Connecting,
    Ready {
        assistant_id: String,
        specialist_id: Option<String>,
    },
    Unavailable(String),
}

pub struct RelayApp {
    config: Config,
    config_path: PathBuf,
    positions: PositionStore,
    /// Last known outer window position, saved on exit.
    window_position: Option<WindowPosition>,
    worker: Option<SessionWorker>,
    connection: Connection,
    /// Rows of the current thread, replaced wholesale on every update.
    rows: Vec<MessageRow>,
    /// Local notices shown after the rows (help text, reset notice). Cleared on the next update.
    notices: Vec<String>,
    chat_input: String,
    chat_error: Option<String>,
    /// True while a send or reset is in flight.
    busy: bool,
    current_screen: Screen,
}

impl RelayApp {
    /// Space between the main screen title (Chat, Info, Logs) and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 48.0;

    pub fn new(cc: &eframe::CreationContext<'_>, config: Config, config_path: PathBuf) -> Self {
        log::info!("desktop started (config {})", config_path.display());
        let positions = PositionStore::new(config::state_path(&config_path));
        let (worker, connection) =
            match AppContext::from_config(config.clone(), config_path.clone()) {
                Ok(ctx) => (
                    Some(SessionWorker::spawn(ctx, cc.egui_ctx.clone())),
                    Connection::Connecting,
                ),
                Err(e) => {
                    log::error!("desktop: {}", e);
                    (None, Connection::Unavailable(e.to_string()))
                }
            };
        Self {
            config,
            config_path,
            positions,
            window_position: None,
            worker,
            connection,
            rows: Vec::new(),
            notices: Vec::new(),
            chat_input: String::new(),
            chat_error: None,
            busy: false,
            current_screen: Screen::default(),
        }
    }

    fn can_send(&self) -> bool {
        !self.busy && matches!(self.connection, Connection::Ready { .. })
    }

    /// Drain worker events. Call each frame.
    fn poll_worker(&mut self) {
        let Some(worker) = &self.worker else { return };
        let mut events = Vec::new();
        while let Some(event) = worker.try_recv() {
            events.push(event);
        }
        for event in events {
            match event {
                Event::Ready {
                    assistant_id,
                    specialist_id,
                } => {
                    self.connection = Connection::Ready {
                        assistant_id,
                        specialist_id,
                    };
                }
                Event::Rows(rows) => {
                    self.busy = false;
                    self.rows = rows;
                    self.notices.clear();
                }
                Event::Reset => {
                    self.busy = false;
                    self.rows.clear();
                    self.notices = vec![
                        "Conversation restarted. Next message will start a new thread.".to_string(),
                    ];
                }
                Event::Failed(e) => {
                    self.busy = false;
                    self.chat_error = Some(e);
                }
                Event::Fatal(e) => {
                    self.busy = false;
                    self.connection = Connection::Unavailable(e);
                    self.worker = None;
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, command: Command) {
        let sent = self.worker.as_ref().map(|w| w.send(command)).unwrap_or(false);
        if sent {
            self.busy = true;
        } else {
            self.connection = Connection::Unavailable("session worker stopped".to_string());
            self.worker = None;
        }
    }

    fn start_chat_turn(&mut self) {
        if !self.can_send() {
            return;
        }
        let message = self.chat_input.trim().to_string();
        if message.is_empty() {
            return;
        }
        self.chat_error = None;
        self.chat_input.clear();

        if message.eq_ignore_ascii_case("/new") {
            self.dispatch(Command::Reset);
            return;
        }
        if message.eq_ignore_ascii_case("/help") {
            self.notices.push(HELP_TEXT.to_string());
            return;
        }
        self.dispatch(Command::Send(message));
    }

    /// Track the outer window position so it can be saved on exit.
    fn track_window_position(&mut self, ctx: &egui::Context) {
        if let Some(rect) = ctx.input(|i| i.viewport().outer_rect) {
            self.window_position = Some(WindowPosition::new(rect.min.x, rect.min.y));
        }
    }

    fn render_row(ui: &mut egui::Ui, row: &MessageRow) {
        let is_user = row.is_user();
        let frame = egui::Frame::none()
            .fill(if is_user {
                ui.style().visuals.extreme_bg_color
            } else {
                ui.style().visuals.panel_fill
            })
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            ui.horizontal(|ui| {
                let who = match row.role {
                    MessageRole::User => "You",
                    MessageRole::Assistant => "Assistant",
                };
                ui.label(egui::RichText::new(who).small().weak());
                if let Some(time) = &row.time {
                    ui.label(egui::RichText::new(time).small().weak());
                }
            });
            if is_user {
                ui.label(egui::RichText::new(&row.text).strong());
            } else {
                ui.label(&row.text);
            }
            if !row.annotations.is_empty() {
                ui.add_space(8.0);
                ui.separator();
                ui.add_space(4.0);
                egui::CollapsingHeader::new(format!("{} annotation(s)", row.annotations.len()))
                    .default_open(false)
                    .show(ui, |ui| {
                        for label in &row.annotations {
                            ui.label(label);
                        }
                    });
            }
        });
    }

    fn render_notice(ui: &mut egui::Ui, text: &str) {
        egui::Frame::none()
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0))
            .show(ui, |ui| {
                ui.label(egui::RichText::new(text).italics());
            });
    }

    /// Messages area fills the space above a fixed input box and button row.
    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        let can_send = self.can_send();

        let row_height = ui.spacing().interact_size.y + 8.0;
        let bottom_section_height =
            CHAT_INPUT_HEIGHT + 8.0 + row_height + Self::SCREEN_FOOTER_SPACING;
        let available = ui.available_height();
        let messages_height = (available - bottom_section_height).max(CHAT_MESSAGES_MIN_HEIGHT);

        let messages_width = ui.available_width();
        let messages_rect = ui
            .allocate_exact_size(
                egui::vec2(messages_width, messages_height),
                egui::Sense::hover(),
            )
            .0;
        let mut messages_ui =
            ui.child_ui(messages_rect, egui::Layout::top_down(egui::Align::Min));
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .show(&mut messages_ui, |ui| {
                // keep the scrollbar on the right edge
                let content_width = ui.available_width();
                ui.allocate_exact_size(egui::vec2(content_width, 0.0), egui::Sense::hover());
                for row in &self.rows {
                    Self::render_row(ui, row);
                    ui.add_space(8.0);
                }
                for notice in &self.notices {
                    Self::render_notice(ui, notice);
                    ui.add_space(8.0);
                }
                if self.busy {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Waiting for the assistant…");
                    });
                }
            });

        ui.add_space(8.0);

        let response = ui
            .add_enabled_ui(can_send, |ui| {
                ui.add_sized(
                    [ui.available_width(), CHAT_INPUT_HEIGHT],
                    egui::TextEdit::multiline(&mut self.chat_input)
                        .hint_text("Type a message (Ctrl+Enter to send)"),
                )
            })
            .inner;
        ui.add_space(8.0);

        let mut send_now = false;
        ui.horizontal(|ui| {
            if ui.add_enabled(can_send, egui::Button::new("Send")).clicked() {
                send_now = true;
            }
            if ui.add_enabled(can_send, egui::Button::new("/new")).clicked() {
                self.chat_error = None;
                self.dispatch(Command::Reset);
            }
        });
        if can_send && response.has_focus() {
            let modifiers = ui.input(|i| i.modifiers);
            if (modifiers.command || modifiers.ctrl) && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                send_now = true;
            }
        }
        if send_now {
            self.start_chat_turn();
        }

        if let Some(ref err) = self.chat_error {
            ui.add_space(8.0);
            ui.colored_label(egui::Color32::RED, err);
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_info_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Info");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let (status, assistant, specialist) = match &self.connection {
            Connection::Connecting => ("connecting", None, None),
            Connection::Ready {
                assistant_id,
                specialist_id,
            } => ("ready", Some(assistant_id.as_str()), specialist_id.as_deref()),
            Connection::Unavailable(_) => ("unavailable", None, None),
        };
        let base_url = self
            .config
            .assistant
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");
        let max_wait = match self.config.polling.max_wait_secs {
            0 => "unbounded".to_string(),
            s => format!("{} s", s),
        };
        let delegation = self
            .config
            .specialist
            .delegation_function
            .clone()
            .unwrap_or_else(|| relay::orchestrator::DEFAULT_DELEGATION_FUNCTION.to_string());

        egui::Grid::new("info_grid")
            .num_columns(2)
            .spacing([24.0, 8.0])
            .show(ui, |ui| {
                let row = |ui: &mut egui::Ui, key: &str, value: String| {
                    ui.label(egui::RichText::new(key).strong());
                    ui.label(value);
                    ui.end_row();
                };
                row(ui, "Status", status.to_string());
                row(ui, "Config", self.config_path.display().to_string());
                row(ui, "API", base_url.to_string());
                row(ui, "Assistant", assistant.unwrap_or("—").to_string());
                row(ui, "Specialist", specialist.unwrap_or("—").to_string());
                row(ui, "Delegation tool", delegation);
                row(
                    ui,
                    "Polling",
                    format!("every {} ms, max wait {}", self.config.polling.interval_ms, max_wait),
                );
            });

        if let Connection::Unavailable(ref reason) = self.connection {
            ui.add_space(16.0);
            ui.colored_label(egui::Color32::RED, reason);
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for RelayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker();
        self.track_window_position(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("Relay");
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            match &self.connection {
                                Connection::Connecting => {
                                    ui.label("Connecting…");
                                    ui.spinner();
                                }
                                Connection::Ready { .. } => {
                                    ui.label("Connected");
                                }
                                Connection::Unavailable(_) => {
                                    ui.colored_label(egui::Color32::RED, "Unavailable");
                                }
                            }
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        let current_screen = &mut self.current_screen;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(140.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        for (screen, label) in
                            [(Screen::Chat, "Chat"), (Screen::Info, "Info"), (Screen::Logs, "Logs")]
                        {
                            if ui.selectable_label(*current_screen == screen, label).clicked() {
                                *current_screen = screen;
                            }
                            ui.add_space(12.0);
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Chat => {
                        ui.add_space(24.0);
                        ui.heading("Chat");
                        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
                        if let Connection::Unavailable(ref reason) = self.connection {
                            ui.colored_label(egui::Color32::RED, reason);
                            ui.add_space(8.0);
                        }
                        self.ui_chat(ui);
                    }
                    Screen::Info => self.ui_info_screen(ui),
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.worker = None;
        if let Some(position) = self.window_position {
            match self.positions.save(position) {
                Ok(()) => log::debug!("desktop: saved window position {},{}", position.x, position.y),
                Err(e) => log::warn!("desktop: saving window position failed: {:#}", e),
            }
        }
    }
}
