//! Relay core library: assistants gateway, conversation orchestrator, specialist agent,
//! and the config/state plumbing shared by the CLI and desktop applications.

pub mod assistants;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod init;
pub mod instructions;
pub mod orchestrator;
pub mod poll;
pub mod position;
pub mod presenter;
pub mod specialist;

pub use error::OrchestratorError;
pub use orchestrator::Orchestrator;
pub use specialist::SpecialistAgent;
