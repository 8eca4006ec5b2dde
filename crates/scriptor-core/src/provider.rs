//! The provider seam: the core consumes connected tool sources through this
//! trait and never manages transport or authentication itself.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ToolContent, ToolDescriptor};

/// An independently connected source of callable tools.
///
/// Implementations own their session lifecycle; the executor only asks for
/// the catalog, invokes tools, and ensures a session exists before running
/// script code.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable identifier for this provider, used for tool provenance.
    fn id(&self) -> &str;

    /// Lists the tools currently exposed by this provider.
    ///
    /// # Errors
    /// Returns an error if the provider cannot be reached.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invokes a tool by name with the given arguments.
    ///
    /// # Errors
    /// Returns an error if the tool is unknown or the invocation fails at
    /// the transport level. Tool-level failures come back as `ToolContent`
    /// with `is_error` set.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolContent>;

    /// Whether this provider currently holds an active session.
    async fn has_active_session(&self) -> bool;

    /// Establishes a session if one is missing.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    async fn connect(&self) -> Result<()>;
}
