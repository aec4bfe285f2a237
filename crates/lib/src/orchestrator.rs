//! Conversation orchestrator: one assistant, one thread, runs polled to completion.
//!
//! The first message creates the thread (combined create-and-run); later messages append to it.
//! When a run pauses on the delegation tool, the question is forwarded to the specialist agent
//! and its answer is submitted as the tool output. After each completed run subscribers receive
//! the full thread history in ascending order (a full replace, not a delta).

use std::sync::Arc;

use async_trait::async_trait;

use crate::assistants::{
    AssistantId, AssistantSpec, AssistantsGateway, FunctionTool, MessageOrder, MessageRole,
    RequiredToolCall, Run, ThreadId, ThreadMessage, ToolOutput,
};
use crate::error::OrchestratorError;
use crate::events::{SubscriptionId, Subscribers};
use crate::poll::{poll_until_complete, PollPolicy, ToolCallResolver};
use crate::specialist::SpecialistAgent;

/// Function name the primary assistant calls to reach the specialist.
pub const DEFAULT_DELEGATION_FUNCTION: &str = "ask_onboarding_specialist";

/// How the primary assistant identity is established on initialize.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantMode {
    /// Create a new assistant with this configuration.
    Create(AssistantSpec),
    /// Fetch a pre-provisioned assistant by id.
    Existing(AssistantId),
}

pub struct Orchestrator {
    gateway: Arc<dyn AssistantsGateway>,
    mode: AssistantMode,
    delegation_function: String,
    policy: PollPolicy,
    specialist: Option<SpecialistAgent>,
    assistant_id: Option<AssistantId>,
    thread_id: Option<ThreadId>,
    client: Option<Arc<dyn AssistantsGateway>>,
    subscribers: Subscribers<[ThreadMessage]>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn AssistantsGateway>, mode: AssistantMode, policy: PollPolicy) -> Self {
        Self {
            gateway,
            mode,
            delegation_function: DEFAULT_DELEGATION_FUNCTION.to_string(),
            policy,
            specialist: None,
            assistant_id: None,
            thread_id: None,
            client: None,
            subscribers: Subscribers::new(),
        }
    }

    /// Route calls to `function` through `specialist`.
    pub fn with_specialist(mut self, specialist: SpecialistAgent, function: impl Into<String>) -> Self {
        self.specialist = Some(specialist);
        self.delegation_function = function.into();
        self
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant_id.as_deref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.assistant_id.is_some() && self.client.is_some()
    }

    pub fn specialist(&self) -> Option<&SpecialistAgent> {
        self.specialist.as_ref()
    }

    pub fn delegation_function(&self) -> &str {
        &self.delegation_function
    }

    /// Register a listener for the full thread history after each completed run.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&[ThreadMessage]) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Reset everything, then establish the assistant identity (and the specialist's, if any).
    pub async fn initialize(&mut self) -> Result<(), OrchestratorError> {
        self.cleanup();
        let id = match &self.mode {
            AssistantMode::Create(spec) => {
                let spec = self.spec_with_delegation(spec);
                log::info!("orchestrator: creating assistant {} ({})", spec.name, spec.model);
                self.gateway.create_assistant(&spec).await?
            }
            AssistantMode::Existing(id) => {
                log::info!("orchestrator: fetching assistant {}", id);
                self.gateway.get_assistant(id).await?
            }
        };
        self.assistant_id = Some(id);
        self.client = Some(self.gateway.clone());
        if let Some(specialist) = self.specialist.as_mut() {
            specialist.initialize().await?;
        }
        Ok(())
    }

    /// Forget assistant, thread, client handle and subscribers. No network calls; safe to repeat.
    /// The remote thread is left as is.
    pub fn cleanup(&mut self) {
        if let Some(thread) = self.thread_id.take() {
            log::debug!("orchestrator: dropping thread {}", thread);
        }
        self.assistant_id = None;
        self.client = None;
        self.subscribers.clear();
        if let Some(specialist) = self.specialist.as_mut() {
            specialist.cleanup();
        }
    }

    /// Send one user message, wait for the run, and return the full thread history.
    ///
    /// Subscribers are notified with the same history before this returns.
    pub async fn handle_customer_message(
        &mut self,
        content: &str,
    ) -> Result<Vec<ThreadMessage>, OrchestratorError> {
        let (assistant_id, client) = match (&self.assistant_id, &self.client) {
            (Some(a), Some(c)) => (a.clone(), c.clone()),
            _ => {
                return Err(OrchestratorError::InvalidState(
                    "orchestrator not initialized".to_string(),
                ))
            }
        };
        if content.trim().is_empty() {
            return Err(OrchestratorError::InvalidArgument(
                "message content is empty".to_string(),
            ));
        }

        let (thread_id, run_id) = match &self.thread_id {
            None => {
                let started = client.create_thread_and_run(&assistant_id, content).await?;
                log::info!("orchestrator: started thread {}", started.thread_id);
                self.thread_id = Some(started.thread_id.clone());
                (started.thread_id, started.run_id)
            }
            Some(thread) => {
                client
                    .create_message(thread, MessageRole::User, content)
                    .await?;
                let run_id = client.create_run(thread, &assistant_id).await?;
                (thread.clone(), run_id)
            }
        };
        if run_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidState(
                "run creation returned no run id".to_string(),
            ));
        }
        log::debug!("orchestrator: polling run {} on thread {}", run_id, thread_id);

        let mut delegation = Delegation {
            function: &self.delegation_function,
            specialist: self.specialist.as_mut(),
        };
        let polled = poll_until_complete(
            client.as_ref(),
            &thread_id,
            &run_id,
            &self.policy,
            &mut delegation,
        )
        .await;
        if let Err(
            e @ (OrchestratorError::RunTimedOut { .. } | OrchestratorError::Cancelled),
        ) = polled
        {
            // The run is still active remotely and would reject new messages on this thread.
            log::warn!(
                "orchestrator: abandoning thread {} with unfinished run {}",
                thread_id,
                run_id
            );
            self.thread_id = None;
            return Err(e);
        }
        polled?;

        let history = client
            .list_messages(&thread_id, MessageOrder::Ascending)
            .await?;
        log::debug!("orchestrator: thread {} has {} messages", thread_id, history.len());
        self.subscribers.emit(&history);
        Ok(history)
    }

    fn spec_with_delegation(&self, spec: &AssistantSpec) -> AssistantSpec {
        let mut spec = spec.clone();
        if self.specialist.is_some() && !spec.tools.iter().any(|t| t.name == self.delegation_function) {
            spec.tools.push(delegation_tool(&self.delegation_function));
        }
        spec
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Function tool declaration for the delegation call: one required string `query`.
pub fn delegation_tool(name: &str) -> FunctionTool {
    FunctionTool {
        name: name.to_string(),
        description: Some(
            "Ask the onboarding specialist a question on the customer's behalf.".to_string(),
        ),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The question to ask." }
            },
            "required": ["query"]
        }),
    }
}

/// Extract `query` from a tool call's JSON arguments. Anything unparsable yields an empty query.
pub fn parse_delegation_query(arguments: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(v) => v
            .get("query")
            .and_then(|q| q.as_str())
            .unwrap_or_default()
            .to_string(),
        Err(e) => {
            log::warn!("orchestrator: ignoring malformed tool arguments: {}", e);
            String::new()
        }
    }
}

/// Answers delegation tool calls through the specialist.
struct Delegation<'a> {
    function: &'a str,
    specialist: Option<&'a mut SpecialistAgent>,
}

#[async_trait]
impl<'a> ToolCallResolver for Delegation<'a> {
    async fn resolve(
        &mut self,
        run: &Run,
        calls: &[RequiredToolCall],
    ) -> Result<Vec<ToolOutput>, OrchestratorError> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            if call.function_name != self.function {
                return Err(OrchestratorError::UnhandledRunState {
                    run_id: run.id.clone(),
                    detail: format!("unknown function {}", call.function_name),
                });
            }
            let specialist = self.specialist.as_deref_mut().ok_or_else(|| {
                OrchestratorError::UnhandledRunState {
                    run_id: run.id.clone(),
                    detail: format!("no specialist configured for {}", call.function_name),
                }
            })?;
            let query = parse_delegation_query(&call.arguments);
            log::info!("orchestrator: delegating tool call {} to specialist", call.id);
            let output = specialist.handle_customer_message(&query).await?;
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_from_well_formed_arguments() {
        assert_eq!(
            parse_delegation_query(r#"{"query":"reset password"}"#),
            "reset password"
        );
    }

    #[test]
    fn malformed_or_missing_query_is_empty() {
        assert_eq!(parse_delegation_query("{not json"), "");
        assert_eq!(parse_delegation_query(""), "");
        assert_eq!(parse_delegation_query(r#"{"question":"hi"}"#), "");
        assert_eq!(parse_delegation_query(r#"{"query":42}"#), "");
        assert_eq!(parse_delegation_query("[1,2]"), "");
    }

    #[test]
    fn delegation_tool_requires_query() {
        let tool = delegation_tool("ask_specialist");
        assert_eq!(tool.name, "ask_specialist");
        assert_eq!(tool.parameters["required"][0], "query");
        assert_eq!(tool.parameters["properties"]["query"]["type"], "string");
    }
}
