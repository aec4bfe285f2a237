//! Last window position, kept in a small key-value JSON file (`state.json`).
//!
//! The value is stored as `"x,y"` under `windowPosition`. Anything missing or unparsable loads as
//! no position; callers never see a read error.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const POSITION_KEY: &str = "windowPosition";

/// Screen position of the window's outer top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPosition {
    pub x: f32,
    pub y: f32,
}

impl WindowPosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn encode(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// Parse `"x,y"`. Exactly two finite numbers, otherwise None.
    fn decode(s: &str) -> Option<Self> {
        let mut parts = s.split(',');
        let x = parts.next()?.trim().parse::<f32>().ok()?;
        let y = parts.next()?.trim().parse::<f32>().ok()?;
        if parts.next().is_some() || !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(Self { x, y })
    }
}

#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved position, or None when absent or corrupted.
    pub fn load(&self) -> Option<WindowPosition> {
        let map = read_map(&self.path)?;
        match map.get(POSITION_KEY) {
            Some(Value::String(s)) => WindowPosition::decode(s),
            _ => None,
        }
    }

    /// Store the position, keeping any other keys already in the file.
    pub fn save(&self, position: WindowPosition) -> Result<()> {
        let mut map = read_map(&self.path).unwrap_or_default();
        map.insert(POSITION_KEY.to_string(), Value::String(position.encode()));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating state directory {}", parent.display()))?;
        }
        let s = serde_json::to_string_pretty(&Value::Object(map))?;
        std::fs::write(&self.path, s)
            .with_context(|| format!("writing window position to {}", self.path.display()))?;
        Ok(())
    }
}

fn read_map(path: &Path) -> Option<Map<String, Value>> {
    let s = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Value>(&s) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
