//! Specialist agent: answers one delegated question per call on a fresh thread.
//!
//! Unlike the orchestrator it never keeps a thread between calls and never answers tool calls.

use std::sync::Arc;

use crate::assistants::{AssistantId, AssistantsGateway, MessageOrder, MessageRole};
use crate::error::OrchestratorError;
use crate::poll::{poll_until_complete, NoToolCalls, PollPolicy};

pub struct SpecialistAgent {
    gateway: Arc<dyn AssistantsGateway>,
    /// Pre-provisioned assistant this agent fetches on initialize.
    configured_id: AssistantId,
    policy: PollPolicy,
    assistant_id: Option<AssistantId>,
    client: Option<Arc<dyn AssistantsGateway>>,
}

impl SpecialistAgent {
    pub fn new(
        gateway: Arc<dyn AssistantsGateway>,
        assistant_id: impl Into<AssistantId>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            gateway,
            configured_id: assistant_id.into(),
            policy,
            assistant_id: None,
            client: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.assistant_id.is_some() && self.client.is_some()
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant_id.as_deref()
    }

    /// Reset, then fetch the configured assistant.
    pub async fn initialize(&mut self) -> Result<(), OrchestratorError> {
        self.cleanup();
        let id = self.gateway.get_assistant(&self.configured_id).await?;
        log::info!("specialist: using assistant {}", id);
        self.assistant_id = Some(id);
        self.client = Some(self.gateway.clone());
        Ok(())
    }

    /// Drop identity and client handle. No network calls; safe to repeat.
    pub fn cleanup(&mut self) {
        self.assistant_id = None;
        self.client = None;
    }

    /// Ask one question on a new thread and return the newest assistant reply text.
    ///
    /// Empty questions are forwarded as is (a malformed delegation still reaches the specialist).
    /// Returns an empty string when the run produced no assistant message.
    pub async fn handle_customer_message(&mut self, content: &str) -> Result<String, OrchestratorError> {
        let (assistant_id, client) = match (&self.assistant_id, &self.client) {
            (Some(a), Some(c)) => (a.clone(), c.clone()),
            _ => {
                return Err(OrchestratorError::InvalidState(
                    "specialist not initialized".to_string(),
                ))
            }
        };
        if content.trim().is_empty() {
            log::debug!("specialist: forwarding empty query");
        }

        let started = client.create_thread_and_run(&assistant_id, content).await?;
        if started.run_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidState(
                "run creation returned no run id".to_string(),
            ));
        }
        log::debug!(
            "specialist: thread {} run {}",
            started.thread_id,
            started.run_id
        );
        poll_until_complete(
            client.as_ref(),
            &started.thread_id,
            &started.run_id,
            &self.policy,
            &mut NoToolCalls,
        )
        .await?;

        let messages = client
            .list_messages(&started.thread_id, MessageOrder::Descending)
            .await?;
        let reply = messages
            .iter()
            .find(|m| m.role == MessageRole::Assistant)
            .and_then(|m| m.last_text())
            .unwrap_or("")
            .to_string();
        Ok(reply)
    }
}

impl Drop for SpecialistAgent {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistants::{
        AssistantSpec, GatewayError, Run, RunId, ThreadMessage, ThreadRun, ToolOutput,
    };
    use async_trait::async_trait;

    /// Gateway that fails every call; used to prove no call is made.
    struct Unreachable;

    #[async_trait]
    impl AssistantsGateway for Unreachable {
        async fn create_assistant(&self, _: &AssistantSpec) -> Result<AssistantId, GatewayError> {
            panic!("unexpected call")
        }
        async fn get_assistant(&self, _: &str) -> Result<AssistantId, GatewayError> {
            panic!("unexpected call")
        }
        async fn create_thread_and_run(&self, _: &str, _: &str) -> Result<ThreadRun, GatewayError> {
            panic!("unexpected call")
        }
        async fn create_message(&self, _: &str, _: MessageRole, _: &str) -> Result<(), GatewayError> {
            panic!("unexpected call")
        }
        async fn create_run(&self, _: &str, _: &str) -> Result<RunId, GatewayError> {
            panic!("unexpected call")
        }
        async fn get_run(&self, _: &str, _: &str) -> Result<Run, GatewayError> {
            panic!("unexpected call")
        }
        async fn submit_tool_outputs(&self, _: &str, _: &str, _: Vec<ToolOutput>) -> Result<(), GatewayError> {
            panic!("unexpected call")
        }
        async fn list_messages(&self, _: &str, _: MessageOrder) -> Result<Vec<ThreadMessage>, GatewayError> {
            panic!("unexpected call")
        }
    }

    #[tokio::test]
    async fn uninitialized_specialist_rejects_without_network() {
        let mut agent = SpecialistAgent::new(Arc::new(Unreachable), "asst_spec", PollPolicy::default());
        let err = agent.handle_customer_message("hello").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidState(_)));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut agent = SpecialistAgent::new(Arc::new(Unreachable), "asst_spec", PollPolicy::default());
        agent.cleanup();
        agent.cleanup();
        assert!(!agent.is_initialized());
        assert_eq!(agent.assistant_id(), None);
    }
}
