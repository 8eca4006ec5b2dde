//! Core types for the scriptor workspace.
//!
//! This crate carries the shared data model (tool descriptors, filter
//! outcomes, execution results), the `ToolProvider` seam to external tool
//! sources, the crate-wide error type, and the configuration surface.

/// Configuration types for pre-filtering and sandbox execution.
pub mod config;
/// Error type and result alias.
pub mod error;
/// The provider trait consumed from external collaborators.
pub mod provider;
/// Shared data model.
pub mod types;

pub use config::{FilterConfig, SandboxConfig, ScriptorConfig};
pub use error::{Error, Result};
pub use provider::ToolProvider;
pub use types::{
    ContentItem, ExecutionResult, ExecutorState, FilterOutcome, ToolContent, ToolDescriptor,
};
