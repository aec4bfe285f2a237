//! Assistant instructions loader: INSTRUCTIONS.md in the workspace.
//!
//! Used only when the primary assistant is created (not when fetched by id) and
//! `assistant.instructions` is not set in config.

use std::fs;
use std::path::Path;

/// Instructions seeded by `relay init` and used when nothing else is configured.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a friendly customer support assistant. \
Answer briefly and precisely. When the customer asks about account setup, onboarding, \
passwords or first steps, call the onboarding specialist tool with their question and \
base your answer on its reply.";

/// Load instructions from the workspace (INSTRUCTIONS.md).
///
/// Returns the file contents when the file exists and is non-empty; otherwise None.
pub fn load_instructions(workspace_dir: Option<&Path>) -> Option<String> {
    let dir = workspace_dir?;
    let path = dir.join("INSTRUCTIONS.md");
    match fs::read_to_string(&path) {
        Ok(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_file_is_none() {
        let dir = std::env::temp_dir().join(format!("relay-instr-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(load_instructions(None), None);
        assert_eq!(load_instructions(Some(&dir.join("nope"))), None);
        std::fs::write(dir.join("INSTRUCTIONS.md"), "  \n").unwrap();
        assert_eq!(load_instructions(Some(&dir)), None);
        std::fs::write(dir.join("INSTRUCTIONS.md"), "Be nice.").unwrap();
        assert_eq!(load_instructions(Some(&dir)).as_deref(), Some("Be nice."));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
