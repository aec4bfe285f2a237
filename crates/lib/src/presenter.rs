//! Session presenter: drives the orchestrator lifecycle for a UI and maps thread history to rows.

use std::sync::{Arc, Mutex};

use crate::assistants::{Annotation, AnnotationKind, MessageContent, MessageRole, ThreadMessage};
use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;

/// One renderable chat row.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub role: MessageRole,
    pub text: String,
    /// Human-readable annotation labels (citations, generated files).
    pub annotations: Vec<String>,
    /// Local time of day the message was created (`HH:MM`), when known.
    pub time: Option<String>,
}

impl MessageRow {
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

pub fn annotation_label(a: &Annotation) -> String {
    match a.kind {
        AnnotationKind::FileCitation => format!("citation {} → {}", a.text, a.file_id),
        AnnotationKind::FilePath => format!("file {} → {}", a.text, a.file_id),
    }
}

/// Map one thread message to a row. Image parts become `[image <file id>]` lines.
pub fn message_row(m: &ThreadMessage) -> MessageRow {
    let text = m
        .content
        .iter()
        .map(|c| match c {
            MessageContent::Text { value, .. } => value.clone(),
            MessageContent::ImageFile { file_id } => format!("[image {}]", file_id),
        })
        .collect::<Vec<_>>()
        .join("\n");
    let time = if m.created_at > 0 {
        chrono::DateTime::from_timestamp(m.created_at, 0)
            .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
    } else {
        None
    };
    MessageRow {
        role: m.role,
        text,
        annotations: m.annotations().map(annotation_label).collect(),
        time,
    }
}

pub fn message_rows(history: &[ThreadMessage]) -> Vec<MessageRow> {
    history.iter().map(message_row).collect()
}

/// Owns the orchestrator for one UI session. Rows are replaced wholesale on every update.
pub struct SessionPresenter {
    orchestrator: Orchestrator,
    rows: Arc<Mutex<Vec<MessageRow>>>,
}

impl SessionPresenter {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            rows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// UI loaded: initialize the orchestrator and listen for history updates.
    pub async fn load(&mut self) -> Result<(), OrchestratorError> {
        self.orchestrator.initialize().await?;
        self.clear_rows();
        let rows = self.rows.clone();
        self.orchestrator.subscribe(move |history: &[ThreadMessage]| {
            if let Ok(mut r) = rows.lock() {
                *r = message_rows(history);
            }
        });
        Ok(())
    }

    /// UI unloaded: drop identity, thread and listeners. No network calls.
    pub fn unload(&mut self) {
        self.orchestrator.cleanup();
    }

    /// Start over with a fresh thread: unload, then load again.
    pub async fn reset(&mut self) -> Result<(), OrchestratorError> {
        self.unload();
        self.load().await
    }

    pub async fn send(&mut self, text: &str) -> Result<Vec<MessageRow>, OrchestratorError> {
        self.orchestrator.handle_customer_message(text).await?;
        Ok(self.rows())
    }

    pub fn rows(&self) -> Vec<MessageRow> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn is_loaded(&self) -> bool {
        self.orchestrator.is_initialized()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn clear_rows(&self) {
        if let Ok(mut r) = self.rows.lock() {
            r.clear();
        }
    }
}
