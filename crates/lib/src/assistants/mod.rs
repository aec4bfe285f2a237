//! Remote assistants gateway: assistant, thread, run, and message operations.
//!
//! `AssistantsGateway` is the seam the orchestrator talks through; `OpenAiAssistantsClient`
//! implements it over the Assistants v2 REST API. Types here are the domain view of the
//! vendor's objects; wire types stay private to the client.

mod openai;

pub use openai::OpenAiAssistantsClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque assistant identifier (e.g. `asst_...`).
pub type AssistantId = String;
/// Opaque thread identifier (e.g. `thread_...`).
pub type ThreadId = String;
/// Opaque run identifier (e.g. `run_...`).
pub type RunId = String;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("assistants request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("assistants api error: {status} {message}")]
    Api { status: u16, message: String },
    #[error("assistants response malformed: {0}")]
    Malformed(String),
}

/// Static configuration for an assistant created by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
    /// Function tools the assistant may call (e.g. the specialist delegation tool).
    #[serde(default)]
    pub tools: Vec<FunctionTool>,
}

/// Function tool declaration attached to an assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

/// Identifiers returned by the combined create-thread-and-run call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRun {
    pub thread_id: ThreadId,
    pub run_id: RunId,
}

/// Run lifecycle status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    /// A status this client does not know; treated as still running.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// True once the run can make no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::Failed
                | RunStatus::Cancelled
                | RunStatus::Expired
                | RunStatus::Incomplete
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function call the run is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredToolCall {
    pub id: String,
    pub function_name: String,
    /// Raw JSON argument string exactly as produced by the model.
    pub arguments: String,
}

/// Output for one required tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Error detail attached to a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// Snapshot of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub id: RunId,
    pub thread_id: ThreadId,
    pub status: RunStatus,
    /// Tool calls that must be answered before the run continues. Empty unless `requires_action`.
    pub required_tool_calls: Vec<RequiredToolCall>,
    pub last_error: Option<RunError>,
}

/// What the poll loop should do with a run snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Run finished successfully; history can be fetched.
    Completed,
    /// Run is paused until these tool calls are answered.
    RequiresToolCalls(Vec<RequiredToolCall>),
    /// Still queued or in progress.
    Pending,
    /// Terminal, but not a success.
    Ended {
        status: RunStatus,
        last_error: Option<RunError>,
    },
}

impl Run {
    pub fn outcome(&self) -> RunOutcome {
        match self.status {
            RunStatus::Completed => RunOutcome::Completed,
            RunStatus::RequiresAction if !self.required_tool_calls.is_empty() => {
                RunOutcome::RequiresToolCalls(self.required_tool_calls.clone())
            }
            s if s.is_terminal() => RunOutcome::Ended {
                status: s,
                last_error: self.last_error.clone(),
            },
            _ => RunOutcome::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Sort order for listing thread messages (by creation time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrder {
    Ascending,
    Descending,
}

impl MessageOrder {
    pub fn as_query(self) -> &'static str {
        match self {
            MessageOrder::Ascending => "asc",
            MessageOrder::Descending => "desc",
        }
    }
}

/// Citation or generated-file reference attached to a span of message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    /// The span of message text this annotation replaces (e.g. `【4:0†source】`).
    pub text: String,
    pub file_id: String,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    FileCitation,
    FilePath,
}

/// One content part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        value: String,
        annotations: Vec<Annotation>,
    },
    ImageFile {
        file_id: String,
    },
}

/// An immutable message in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: Vec<MessageContent>,
    /// Unix seconds.
    pub created_at: i64,
}

impl ThreadMessage {
    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { value, .. } => Some(value.as_str()),
                MessageContent::ImageFile { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The last text part that is not empty, if any.
    pub fn last_text(&self) -> Option<&str> {
        self.content.iter().rev().find_map(|c| match c {
            MessageContent::Text { value, .. } if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        })
    }

    /// Annotations across all text parts, in content order.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.content.iter().flat_map(|c| match c {
            MessageContent::Text { annotations, .. } => annotations.as_slice(),
            MessageContent::ImageFile { .. } => &[][..],
        })
    }
}

/// Operations consumed from the remote assistants service.
#[async_trait]
pub trait AssistantsGateway: Send + Sync {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, GatewayError>;

    async fn get_assistant(&self, assistant_id: &str) -> Result<AssistantId, GatewayError>;

    /// Create a thread seeded with one user message and start a run on it.
    async fn create_thread_and_run(
        &self,
        assistant_id: &str,
        initial_message: &str,
    ) -> Result<ThreadRun, GatewayError>;

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), GatewayError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunId, GatewayError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), GatewayError>;

    /// Every message in the thread in the given order.
    async fn list_messages(
        &self,
        thread_id: &str,
        order: MessageOrder,
    ) -> Result<Vec<ThreadMessage>, GatewayError>;
}
