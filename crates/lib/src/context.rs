//! Application context: built once at startup and handed to every component that needs it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assistants::{AssistantSpec, AssistantsGateway, OpenAiAssistantsClient};
use crate::config::{self, AssistantModeSetting, Config, ConfigError};
use crate::instructions::{load_instructions, DEFAULT_INSTRUCTIONS};
use crate::orchestrator::{AssistantMode, Orchestrator, DEFAULT_DELEGATION_FUNCTION};
use crate::poll::PollPolicy;
use crate::position::PositionStore;
use crate::specialist::SpecialistAgent;

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub positions: PositionStore,
    gateway: Arc<dyn AssistantsGateway>,
}

impl AppContext {
    /// Build the context with the HTTP gateway. Fails when no API key is configured.
    pub fn from_config(config: Config, config_path: PathBuf) -> Result<Self, ConfigError> {
        let api_key = config::resolve_api_key(&config)?;
        let client = OpenAiAssistantsClient::new(api_key, config.assistant.base_url.clone());
        log::debug!("context: assistants api at {}", client.base_url());
        Ok(Self::with_gateway(config, config_path, Arc::new(client)))
    }

    /// Build the context around any gateway implementation.
    pub fn with_gateway(
        config: Config,
        config_path: PathBuf,
        gateway: Arc<dyn AssistantsGateway>,
    ) -> Self {
        let positions = PositionStore::new(config::state_path(&config_path));
        Self {
            config,
            config_path,
            positions,
            gateway,
        }
    }

    pub fn gateway(&self) -> Arc<dyn AssistantsGateway> {
        self.gateway.clone()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.config.polling.to_policy()
    }

    pub fn workspace_dir(&self) -> PathBuf {
        config::resolve_workspace_dir(&self.config, &self.config_path)
    }

    /// How the primary assistant is established, per `assistant.mode`.
    pub fn assistant_mode(&self) -> Result<AssistantMode, ConfigError> {
        let id = config::resolve_assistant_id(&self.config);
        match (self.config.assistant.mode, id) {
            (AssistantModeSetting::Existing, None) => Err(ConfigError::MissingAssistantId),
            (AssistantModeSetting::Existing, Some(id)) | (AssistantModeSetting::Auto, Some(id)) => {
                Ok(AssistantMode::Existing(id))
            }
            (AssistantModeSetting::Create, _) | (AssistantModeSetting::Auto, None) => {
                Ok(AssistantMode::Create(self.assistant_spec()))
            }
        }
    }

    fn assistant_spec(&self) -> AssistantSpec {
        let instructions = self
            .config
            .assistant
            .instructions
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| load_instructions(Some(self.workspace_dir().as_path())))
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());
        AssistantSpec {
            name: config::assistant_name(&self.config),
            instructions,
            model: config::assistant_model(&self.config),
            tools: Vec::new(),
        }
    }

    /// Orchestrator wired with the specialist when a specialist id is configured.
    pub fn build_orchestrator(&self) -> Result<Orchestrator, ConfigError> {
        self.build_orchestrator_with(self.poll_policy())
    }

    /// Like `build_orchestrator`, polling with `policy` (e.g. the configured one plus a cancel token).
    /// The specialist shares the policy.
    pub fn build_orchestrator_with(&self, policy: PollPolicy) -> Result<Orchestrator, ConfigError> {
        let orchestrator = Orchestrator::new(self.gateway(), self.assistant_mode()?, policy.clone());
        match config::resolve_specialist_id(&self.config) {
            Some(id) => {
                let function = self
                    .config
                    .specialist
                    .delegation_function
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_DELEGATION_FUNCTION.to_string());
                log::info!("context: delegating {} to specialist {}", function, id);
                let specialist = SpecialistAgent::new(self.gateway(), id, policy);
                Ok(orchestrator.with_specialist(specialist, function))
            }
            None => Ok(orchestrator),
        }
    }

    pub fn config_dir(&self) -> &Path {
        self.config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(config: Config) -> AppContext {
        let gateway = Arc::new(OpenAiAssistantsClient::new("sk-test", None));
        AppContext::with_gateway(config, PathBuf::from("/tmp/relay-ctx/config.json"), gateway)
    }

    #[test]
    fn create_mode_uses_configured_name_model_and_instructions() {
        let mut config = Config::default();
        config.assistant.mode = AssistantModeSetting::Create;
        config.assistant.name = Some("Onboarding Desk".to_string());
        config.assistant.instructions = Some("Answer briefly.".to_string());
        match context(config).assistant_mode().unwrap() {
            AssistantMode::Create(spec) => {
                assert_eq!(spec.name, "Onboarding Desk");
                assert_eq!(spec.model, "gpt-4o-mini");
                assert_eq!(spec.instructions, "Answer briefly.");
                assert!(spec.tools.is_empty());
            }
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn configured_id_selects_existing_assistant() {
        let mut config = Config::default();
        config.assistant.mode = AssistantModeSetting::Existing;
        config.assistant.assistant_id = Some("asst_cfg".to_string());
        assert!(matches!(
            context(config).assistant_mode().unwrap(),
            AssistantMode::Existing(_)
        ));
    }

    #[test]
    fn state_file_sits_next_to_config() {
        let ctx = context(Config::default());
        assert_eq!(ctx.config_dir(), Path::new("/tmp/relay-ctx"));
        assert_eq!(ctx.positions.path(), Path::new("/tmp/relay-ctx/state.json"));
    }
}
