//! Sandboxed JavaScript execution over a catalog of provider tools.
//!
//! Scripts run in a restricted Boa context where each connected provider
//! appears as a frozen namespace object of async tool functions, plus
//! `search_tools` for catalog discovery and `print`/`console` for output
//! capture. The [`CodeExecutor`] owns the whole lifecycle: connect
//! providers, build the namespace, evaluate under a deadline, and fold
//! every outcome into an [`ExecutionResult`](scriptor_core::ExecutionResult).

pub mod catalog;
pub mod error;
pub mod executor;
pub mod namespace;
pub mod runtime;

pub use catalog::Catalog;
pub use error::{ScriptError, ScriptResult};
pub use executor::CodeExecutor;
pub use namespace::{BuiltNamespace, NamespaceBuilder, render_signatures, sanitize_name};
pub use runtime::{evaluate, wrap_script};
