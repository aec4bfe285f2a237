//! Initialize the configuration directory: create ~/.relay, default config, and workspace.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::instructions::DEFAULT_INSTRUCTIONS;

/// Ensure the configuration directory has been initialized (config file exists).
pub fn require_initialized(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `relay init` first (config file not found: {})",
            config_path.display()
        );
    }
    Ok(())
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Creates the `workspace` subdirectory and seeds `INSTRUCTIONS.md` if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let workspace = config_dir.join("workspace");
    if !workspace.exists() {
        std::fs::create_dir_all(&workspace)
            .with_context(|| format!("creating workspace directory {}", workspace.display()))?;
        log::info!("created workspace directory at {}", workspace.display());
    }
    let instructions = workspace.join("INSTRUCTIONS.md");
    if !instructions.exists() {
        std::fs::write(&instructions, DEFAULT_INSTRUCTIONS).with_context(|| {
            format!("writing default INSTRUCTIONS.md to {}", instructions.display())
        })?;
        log::info!("wrote default INSTRUCTIONS.md to {}", instructions.display());
    } else {
        log::debug!("INSTRUCTIONS.md already exists at {}, skipping", instructions.display());
    }

    Ok(config_dir.to_path_buf())
}
