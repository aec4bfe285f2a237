//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Environment variables override the file for the API key and pre-provisioned assistant ids.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poll::PollPolicy;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ASSISTANT_ID_ENV: &str = "RELAY_ASSISTANT_ID";
pub const SPECIALIST_ID_ENV: &str = "RELAY_SPECIALIST_ID";
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG_PATH";

const DEFAULT_ASSISTANT_NAME: &str = "Relay Support";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Startup configuration problems that make the app unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no API key: set OPENAI_API_KEY or assistant.apiKey in the config file")]
    MissingApiKey,
    #[error("assistant.mode is \"existing\" but no assistant id: set RELAY_ASSISTANT_ID or assistant.assistantId")]
    MissingAssistantId,
}

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Primary assistant and service access.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Optional specialist the primary assistant delegates to.
    #[serde(default)]
    pub specialist: SpecialistConfig,

    /// Run polling interval and bound.
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Whether the primary assistant is created on startup or fetched by id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantModeSetting {
    /// Fetch when an assistant id is configured, otherwise create.
    #[default]
    Auto,
    Create,
    Existing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Service API key. Overridden by OPENAI_API_KEY env.
    pub api_key: Option<String>,
    /// API base URL (default https://api.openai.com/v1).
    pub base_url: Option<String>,
    #[serde(default)]
    pub mode: AssistantModeSetting,
    /// Pre-provisioned assistant id. Overridden by RELAY_ASSISTANT_ID env.
    pub assistant_id: Option<String>,
    /// Name used when creating the assistant (default "Relay Support").
    pub name: Option<String>,
    /// Model used when creating the assistant (default "gpt-4o-mini").
    pub model: Option<String>,
    /// Instructions used when creating the assistant. When unset, workspace INSTRUCTIONS.md is used.
    pub instructions: Option<String>,
    /// Workspace root (default ~/.relay/workspace).
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistConfig {
    /// Pre-provisioned specialist assistant id. Overridden by RELAY_SPECIALIST_ID env.
    pub assistant_id: Option<String>,
    /// Function name the primary assistant calls to delegate (default "ask_onboarding_specialist").
    pub delegation_function: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    /// Delay between run status checks in milliseconds (default 250).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Give up on a run after this many seconds (default 600). 0 waits indefinitely.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_interval_ms() -> u64 {
    250
}

fn default_max_wait_secs() -> u64 {
    600
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl PollingConfig {
    pub fn to_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            max_wait: if self.max_wait_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(self.max_wait_secs))
            },
            cancel: None,
        }
    }
}

/// Env var value if set and non-blank, else the trimmed config value if non-blank.
fn env_or_config(var: &str, config_value: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config_value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the API key: env OPENAI_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Result<String, ConfigError> {
    env_or_config(API_KEY_ENV, config.assistant.api_key.as_ref()).ok_or(ConfigError::MissingApiKey)
}

/// Resolve the primary assistant id: env RELAY_ASSISTANT_ID overrides config.
pub fn resolve_assistant_id(config: &Config) -> Option<String> {
    env_or_config(ASSISTANT_ID_ENV, config.assistant.assistant_id.as_ref())
}

/// Resolve the specialist assistant id: env RELAY_SPECIALIST_ID overrides config.
pub fn resolve_specialist_id(config: &Config) -> Option<String> {
    env_or_config(SPECIALIST_ID_ENV, config.specialist.assistant_id.as_ref())
}

pub fn assistant_name(config: &Config) -> String {
    config
        .assistant
        .name
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string())
}

pub fn assistant_model(config: &Config) -> String {
    config
        .assistant
        .model
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Local key-value state file (window position) next to the config file.
pub fn state_path(config_path: &Path) -> PathBuf {
    config_dir(config_path).join("state.json")
}

/// Resolve workspace directory (holds INSTRUCTIONS.md). Relative paths resolve against the config directory.
pub fn resolve_workspace_dir(config: &Config, config_path: &Path) -> PathBuf {
    match &config.assistant.workspace {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                config_dir(config_path).join(d)
            }
        }
        _ => config_dir(config_path).join("workspace"),
    }
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_sections_missing() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.polling.max_wait_secs, 600);
        assert_eq!(config.assistant.mode, AssistantModeSetting::Auto);
        assert_eq!(assistant_name(&config), "Relay Support");
        assert_eq!(assistant_model(&config), "gpt-4o-mini");
    }

    #[test]
    fn camel_case_fields_parse() {
        let config: Config = serde_json::from_str(
            r#"{
                "assistant": {"apiKey": "sk-file", "assistantId": "asst_1", "mode": "existing", "model": "gpt-4o"},
                "specialist": {"assistantId": "asst_2", "delegationFunction": "ask_it"},
                "polling": {"intervalMs": 100, "maxWaitSecs": 0}
            }"#,
        )
        .unwrap();
        assert_eq!(config.assistant.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.assistant.mode, AssistantModeSetting::Existing);
        assert_eq!(config.specialist.delegation_function.as_deref(), Some("ask_it"));
        let policy = config.polling.to_policy();
        assert_eq!(policy.interval, Duration::from_millis(100));
        assert_eq!(policy.max_wait, None);
    }

    #[test]
    fn env_overrides_config_and_blank_is_unset() {
        let var = "RELAY_TEST_ENV_OR_CONFIG_OVERRIDE";
        let from_file = Some("  file-value ".to_string());
        std::env::remove_var(var);
        assert_eq!(env_or_config(var, from_file.as_ref()).as_deref(), Some("file-value"));
        std::env::set_var(var, "   ");
        assert_eq!(env_or_config(var, from_file.as_ref()).as_deref(), Some("file-value"));
        std::env::set_var(var, " env-value ");
        assert_eq!(env_or_config(var, from_file.as_ref()).as_deref(), Some("env-value"));
        std::env::remove_var(var);
        assert_eq!(env_or_config(var, Some(&"  ".to_string())), None);
    }

    #[test]
    fn state_and_workspace_live_next_to_config() {
        let path = Path::new("/home/user/.relay/config.json");
        assert_eq!(state_path(path), PathBuf::from("/home/user/.relay/state.json"));
        let mut config = Config::default();
        assert_eq!(
            resolve_workspace_dir(&config, path),
            PathBuf::from("/home/user/.relay/workspace")
        );
        config.assistant.workspace = Some(PathBuf::from("custom"));
        assert_eq!(
            resolve_workspace_dir(&config, path),
            PathBuf::from("/home/user/.relay/custom")
        );
        config.assistant.workspace = Some(PathBuf::from("/srv/relay"));
        assert_eq!(resolve_workspace_dir(&config, path), PathBuf::from("/srv/relay"));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let path = std::env::temp_dir().join("relay-config-test-missing").join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert!(config.assistant.api_key.is_none());
    }
}
