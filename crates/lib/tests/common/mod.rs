//! Scripted in-memory assistants service for orchestrator tests.
//!
//! Every call is recorded. Runs follow a per-assistant script (default: complete on first poll
//! with a reply of `<prefix><last user text>`).

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use relay::assistants::{
    AssistantId, AssistantSpec, AssistantsGateway, GatewayError, MessageContent, MessageOrder,
    MessageRole, RequiredToolCall, Run, RunError, RunId, RunStatus, ThreadMessage, ThreadRun,
    ToolOutput,
};
use relay::poll::PollPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateAssistant { name: String, tools: Vec<String> },
    GetAssistant { id: String },
    CreateThreadAndRun { assistant: String, content: String },
    CreateMessage { thread: String, content: String },
    CreateRun { thread: String, assistant: String },
    GetRun { thread: String, run: String },
    SubmitToolOutputs { thread: String, run: String, outputs: Vec<ToolOutput> },
    ListMessages { thread: String, order: MessageOrder },
}

/// What a newly created run does when polled.
#[derive(Debug, Clone)]
pub enum RunScript {
    /// Completes on the first poll with the assistant's reply.
    Complete,
    /// Pauses with one tool call (`call_1`); completes once outputs are submitted (reply = first output).
    ToolCall { function: String, arguments: String },
    /// Pauses with several tool calls at once; completes like `ToolCall`.
    ToolCalls(Vec<RequiredToolCall>),
    /// Completes with a draft reply followed by the real one.
    CompleteWithDraft,
    /// Completes without adding any assistant message.
    CompleteSilently,
    Fail,
    /// Never leaves `in_progress`.
    Hang,
    /// Run creation returns an empty run id.
    EmptyRunId,
}

struct FakeRun {
    thread: String,
    assistant: String,
    script: RunScript,
    submitted: Option<Vec<ToolOutput>>,
    status: RunStatus,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    next_id: u64,
    clock: i64,
    assistants: Vec<String>,
    reply_prefix: HashMap<String, String>,
    scripts: HashMap<String, VecDeque<RunScript>>,
    threads: HashMap<String, Vec<ThreadMessage>>,
    runs: HashMap<String, FakeRun>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }

    fn push_message(&mut self, thread: &str, role: MessageRole, text: &str) {
        self.clock += 1;
        let id = self.id("msg");
        let msg = ThreadMessage {
            id,
            role,
            content: vec![MessageContent::Text {
                value: text.to_string(),
                annotations: vec![],
            }],
            created_at: self.clock,
        };
        self.threads.entry(thread.to_string()).or_default().push(msg);
    }

    fn start_run(&mut self, thread: &str, assistant: &str) -> String {
        let script = self
            .scripts
            .get_mut(assistant)
            .and_then(|q| q.pop_front())
            .unwrap_or(RunScript::Complete);
        let id = match script {
            RunScript::EmptyRunId => String::new(),
            _ => self.id("run"),
        };
        self.runs.insert(
            id.clone(),
            FakeRun {
                thread: thread.to_string(),
                assistant: assistant.to_string(),
                script,
                submitted: None,
                status: RunStatus::Queued,
            },
        );
        id
    }

    fn reply_for(&self, thread: &str, assistant: &str) -> String {
        let last_user = self
            .threads
            .get(thread)
            .and_then(|msgs| msgs.iter().rev().find(|m| m.role == MessageRole::User))
            .map(|m| m.text())
            .unwrap_or_default();
        let prefix = self.reply_prefix.get(assistant).cloned().unwrap_or_default();
        format!("{}{}", prefix, last_user)
    }
}

pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Register a pre-provisioned assistant whose replies start with `prefix`.
    pub fn with_assistant(self, id: &str, prefix: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.assistants.push(id.to_string());
            s.reply_prefix.insert(id.to_string(), prefix.to_string());
        }
        self
    }

    /// Queue a script for the next run created for `assistant`.
    pub fn script(&self, assistant: &str, script: RunScript) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .entry(assistant.to_string())
            .or_default()
            .push_back(script);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn thread_count(&self) -> usize {
        self.state.lock().unwrap().threads.len()
    }

    pub fn history(&self, thread: &str) -> Vec<ThreadMessage> {
        self.state
            .lock()
            .unwrap()
            .threads
            .get(thread)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn not_found(what: &str, id: &str) -> GatewayError {
    GatewayError::Api {
        status: 404,
        message: format!("No {} found with id '{}'.", what, id),
    }
}

#[async_trait]
impl AssistantsGateway for FakeGateway {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, GatewayError> {
        self.record(Call::CreateAssistant {
            name: spec.name.clone(),
            tools: spec.tools.iter().map(|t| t.name.clone()).collect(),
        });
        let mut s = self.state.lock().unwrap();
        let id = s.id("asst");
        s.assistants.push(id.clone());
        Ok(id)
    }

    async fn get_assistant(&self, assistant_id: &str) -> Result<AssistantId, GatewayError> {
        self.record(Call::GetAssistant {
            id: assistant_id.to_string(),
        });
        let s = self.state.lock().unwrap();
        if s.assistants.iter().any(|a| a == assistant_id) {
            Ok(assistant_id.to_string())
        } else {
            Err(not_found("assistant", assistant_id))
        }
    }

    async fn create_thread_and_run(
        &self,
        assistant_id: &str,
        initial_message: &str,
    ) -> Result<ThreadRun, GatewayError> {
        self.record(Call::CreateThreadAndRun {
            assistant: assistant_id.to_string(),
            content: initial_message.to_string(),
        });
        let mut s = self.state.lock().unwrap();
        let thread_id = s.id("thread");
        s.threads.insert(thread_id.clone(), Vec::new());
        s.push_message(&thread_id, MessageRole::User, initial_message);
        let run_id = s.start_run(&thread_id, assistant_id);
        Ok(ThreadRun { thread_id, run_id })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), GatewayError> {
        self.record(Call::CreateMessage {
            thread: thread_id.to_string(),
            content: content.to_string(),
        });
        let mut s = self.state.lock().unwrap();
        if !s.threads.contains_key(thread_id) {
            return Err(not_found("thread", thread_id));
        }
        s.push_message(thread_id, role, content);
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunId, GatewayError> {
        self.record(Call::CreateRun {
            thread: thread_id.to_string(),
            assistant: assistant_id.to_string(),
        });
        let mut s = self.state.lock().unwrap();
        Ok(s.start_run(thread_id, assistant_id))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        self.record(Call::GetRun {
            thread: thread_id.to_string(),
            run: run_id.to_string(),
        });
        let mut s = self.state.lock().unwrap();
        let (script, submitted, status, assistant) = match s.runs.get(run_id) {
            Some(r) => (r.script.clone(), r.submitted.clone(), r.status, r.assistant.clone()),
            None => return Err(not_found("run", run_id)),
        };
        let mut required = Vec::new();
        let mut last_error = None;
        let next = if status.is_terminal() {
            status
        } else {
            match script {
                RunScript::Complete => {
                    let reply = s.reply_for(thread_id, &assistant);
                    s.push_message(thread_id, MessageRole::Assistant, &reply);
                    RunStatus::Completed
                }
                RunScript::CompleteSilently | RunScript::EmptyRunId => RunStatus::Completed,
                RunScript::CompleteWithDraft => {
                    let prefix = s.reply_prefix.get(&assistant).cloned().unwrap_or_default();
                    s.push_message(thread_id, MessageRole::Assistant, &format!("{}draft", prefix));
                    let reply = s.reply_for(thread_id, &assistant);
                    s.push_message(thread_id, MessageRole::Assistant, &reply);
                    RunStatus::Completed
                }
                RunScript::ToolCall { .. } | RunScript::ToolCalls(_) => match submitted {
                    None => {
                        required = match script {
                            RunScript::ToolCall { function, arguments } => vec![RequiredToolCall {
                                id: "call_1".to_string(),
                                function_name: function,
                                arguments,
                            }],
                            RunScript::ToolCalls(calls) => calls,
                            _ => Vec::new(),
                        };
                        RunStatus::RequiresAction
                    }
                    Some(outputs) => {
                        let prefix = s.reply_prefix.get(&assistant).cloned().unwrap_or_default();
                        let text = outputs.first().map(|o| o.output.clone()).unwrap_or_default();
                        s.push_message(thread_id, MessageRole::Assistant, &format!("{}{}", prefix, text));
                        RunStatus::Completed
                    }
                },
                RunScript::Fail => {
                    last_error = Some(RunError {
                        code: "server_error".to_string(),
                        message: "scripted failure".to_string(),
                    });
                    RunStatus::Failed
                }
                RunScript::Hang => RunStatus::InProgress,
            }
        };
        if let Some(r) = s.runs.get_mut(run_id) {
            r.status = next;
        }
        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            status: next,
            required_tool_calls: required,
            last_error,
        })
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), GatewayError> {
        self.record(Call::SubmitToolOutputs {
            thread: thread_id.to_string(),
            run: run_id.to_string(),
            outputs: outputs.clone(),
        });
        let mut s = self.state.lock().unwrap();
        match s.runs.get_mut(run_id) {
            Some(r) => {
                r.submitted = Some(outputs);
                r.status = RunStatus::Queued;
                Ok(())
            }
            None => Err(not_found("run", run_id)),
        }
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: MessageOrder,
    ) -> Result<Vec<ThreadMessage>, GatewayError> {
        self.record(Call::ListMessages {
            thread: thread_id.to_string(),
            order,
        });
        let s = self.state.lock().unwrap();
        let mut msgs = s
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| not_found("thread", thread_id))?;
        if order == MessageOrder::Descending {
            msgs.reverse();
        }
        Ok(msgs)
    }
}

/// Poll policy for tests: 1 ms ticks, bounded.
pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        max_wait: Some(Duration::from_secs(5)),
        cancel: None,
    }
}
