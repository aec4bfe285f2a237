//! Orchestrator error taxonomy.

use std::time::Duration;

use crate::assistants::{GatewayError, RunError, RunId, RunStatus};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Operation invoked before initialization, or the service returned no run id.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Rejected before any network call (e.g. empty message).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Remote or transport failure, passed through unchanged.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Run reached a terminal status other than `completed`.
    #[error("run {run_id} ended with status {status}{}", fmt_last_error(.last_error))]
    RunEnded {
        run_id: RunId,
        status: RunStatus,
        last_error: Option<RunError>,
    },

    /// Run is waiting on something this component cannot provide.
    #[error("run {run_id} requires unsupported action: {detail}")]
    UnhandledRunState { run_id: RunId, detail: String },

    #[error("run {run_id} did not finish within {waited:?}")]
    RunTimedOut { run_id: RunId, waited: Duration },

    #[error("polling cancelled")]
    Cancelled,
}

fn fmt_last_error(e: &Option<RunError>) -> String {
    match e {
        Some(e) => format!(" ({}: {})", e.code, e.message),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ended_message_includes_last_error() {
        let err = OrchestratorError::RunEnded {
            run_id: "run_1".to_string(),
            status: RunStatus::Failed,
            last_error: Some(RunError {
                code: "server_error".to_string(),
                message: "boom".to_string(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "run run_1 ended with status failed (server_error: boom)"
        );
        let err = OrchestratorError::RunEnded {
            run_id: "run_2".to_string(),
            status: RunStatus::Expired,
            last_error: None,
        };
        assert_eq!(err.to_string(), "run run_2 ended with status expired");
    }

    #[test]
    fn gateway_error_is_transparent() {
        let err: OrchestratorError = GatewayError::Api {
            status: 401,
            message: "bad key".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "assistants api error: 401 bad key");
    }
}
