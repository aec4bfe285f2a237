//! Run polling: wait, fetch status, answer tool calls, repeat until terminal.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::assistants::{AssistantsGateway, RequiredToolCall, Run, RunOutcome, ToolOutput};
use crate::error::OrchestratorError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// How often to poll a run, how long to wait for it, and how to stop early.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the run is terminal, however long that takes.
    pub max_wait: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: Some(DEFAULT_MAX_WAIT),
            cancel: None,
        }
    }
}

impl PollPolicy {
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sleep one interval, returning early with `Cancelled` if the token fires.
    async fn tick(&self) -> Result<(), OrchestratorError> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(OrchestratorError::Cancelled),
                    _ = tokio::time::sleep(self.interval) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(self.interval).await;
                Ok(())
            }
        }
    }
}

/// Produces outputs for the tool calls a paused run is waiting on.
#[async_trait]
pub(crate) trait ToolCallResolver: Send {
    async fn resolve(
        &mut self,
        run: &Run,
        calls: &[RequiredToolCall],
    ) -> Result<Vec<ToolOutput>, OrchestratorError>;
}

/// Resolver for agents that never answer tool calls.
pub(crate) struct NoToolCalls;

#[async_trait]
impl ToolCallResolver for NoToolCalls {
    async fn resolve(
        &mut self,
        run: &Run,
        calls: &[RequiredToolCall],
    ) -> Result<Vec<ToolOutput>, OrchestratorError> {
        let names: Vec<&str> = calls.iter().map(|c| c.function_name.as_str()).collect();
        Err(OrchestratorError::UnhandledRunState {
            run_id: run.id.clone(),
            detail: format!("tool calls not supported here: {}", names.join(", ")),
        })
    }
}

/// Poll `run_id` until it completes. Non-success terminal states, timeouts and cancellation are errors.
pub(crate) async fn poll_until_complete(
    client: &dyn AssistantsGateway,
    thread_id: &str,
    run_id: &str,
    policy: &PollPolicy,
    resolver: &mut dyn ToolCallResolver,
) -> Result<Run, OrchestratorError> {
    let started = tokio::time::Instant::now();
    let mut polls: u64 = 0;
    loop {
        policy.tick().await?;
        if let Some(max) = policy.max_wait {
            let waited = started.elapsed();
            if waited > max {
                log::warn!("poll: run {} still running after {:?}, giving up", run_id, waited);
                return Err(OrchestratorError::RunTimedOut {
                    run_id: run_id.to_string(),
                    waited,
                });
            }
        }
        polls += 1;
        let run = client.get_run(thread_id, run_id).await?;
        match run.outcome() {
            RunOutcome::Completed => {
                log::debug!("poll: run {} completed after {} polls", run_id, polls);
                return Ok(run);
            }
            RunOutcome::Ended { status, last_error } => {
                log::warn!("poll: run {} ended with status {}", run_id, status);
                return Err(OrchestratorError::RunEnded {
                    run_id: run_id.to_string(),
                    status,
                    last_error,
                });
            }
            RunOutcome::RequiresToolCalls(calls) => {
                log::debug!("poll: run {} requires {} tool call(s)", run_id, calls.len());
                let outputs = resolver.resolve(&run, &calls).await?;
                if !outputs.is_empty() {
                    client.submit_tool_outputs(thread_id, run_id, outputs).await?;
                }
            }
            RunOutcome::Pending => {}
        }
    }
}
