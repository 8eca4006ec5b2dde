//! The code executor: prepares a namespace from the catalog and runs one
//! script under a wall-clock deadline.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::task::spawn_blocking;
use tokio::time;

use scriptor_core::{ExecutionResult, ExecutorState, SandboxConfig, ToolDescriptor};
use scriptor_filter::SemanticPreFilter;

use crate::catalog::Catalog;
use crate::error::ScriptError;
use crate::namespace::{BuiltNamespace, NamespaceBuilder};
use crate::runtime::{LogSink, evaluate};

/// Executes agent-authored scripts against a catalog of provider tools.
///
/// `execute` never returns a Rust error; every failure mode is folded into
/// the returned [`ExecutionResult`].
pub struct CodeExecutor {
    catalog: Catalog,
    prefilter: Option<Arc<SemanticPreFilter>>,
    config: SandboxConfig,
}

impl CodeExecutor {
    /// Creates an executor over the given catalog.
    pub fn new(catalog: Catalog, config: SandboxConfig) -> Self {
        Self {
            catalog,
            prefilter: None,
            config,
        }
    }

    /// Attaches a semantic pre-filter used for static-query narrowing and
    /// for `search_tools` inside scripts.
    #[must_use]
    pub fn with_prefilter(mut self, prefilter: Arc<SemanticPreFilter>) -> Self {
        self.prefilter = Some(prefilter);
        self
    }

    /// The catalog this executor runs against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Default deadline from configuration.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Runs a script with no static query under the given deadline.
    pub async fn execute(&self, script: &str, timeout: Duration) -> ExecutionResult {
        self.execute_with_query(script, None, timeout).await
    }

    /// Runs a script, optionally narrowing the bound namespace to tools
    /// relevant to a static query known before execution.
    ///
    /// Tool calls that have already completed when the deadline expires are
    /// not rolled back; the script is simply abandoned.
    pub async fn execute_with_query(
        &self,
        script: &str,
        static_query: Option<&str>,
        timeout: Duration,
    ) -> ExecutionResult {
        let start = Instant::now();
        tracing::debug!(state = %ExecutorState::Preparing, "executor state");

        self.connect_providers().await;

        let grouped = self.grouped_for_query(static_query).await;
        let built = NamespaceBuilder::new(&self.catalog).build(&grouped);
        tracing::debug!(
            tools = built.total_tools(),
            namespaces = built.namespaces.len(),
            "namespace prepared"
        );

        let logs: LogSink = Arc::new(Mutex::new(Vec::new()));

        tracing::debug!(state = %ExecutorState::Running, timeout_seconds = timeout.as_secs_f64(), "executor state");
        let outcome = self
            .run_under_deadline(script.to_owned(), built, Arc::clone(&logs), timeout)
            .await;

        let captured = snapshot_logs(&logs);
        let elapsed = start.elapsed();

        match outcome {
            EvalOutcome::Value(value) => {
                tracing::debug!(state = %ExecutorState::Completed, "executor state");
                ExecutionResult::success(value, captured, elapsed)
            }
            EvalOutcome::TimedOut => {
                tracing::debug!(state = %ExecutorState::TimedOut, "executor state");
                ExecutionResult::failure(
                    ScriptError::Timeout(timeout.as_secs_f64()).to_string(),
                    captured,
                    elapsed,
                )
            }
            EvalOutcome::Failed(message) => {
                tracing::debug!(state = %ExecutorState::Failed, error = message.as_str(), "executor state");
                ExecutionResult::failure(message, captured, elapsed)
            }
        }
    }

    /// Ensures every provider has an active session before script code can
    /// call into it. Connection failures are logged, not fatal: the proxy
    /// surfaces the error if the script actually calls that provider.
    async fn connect_providers(&self) {
        for provider in self.catalog.providers() {
            if provider.has_active_session().await {
                continue;
            }
            if let Err(error) = provider.connect().await {
                tracing::warn!(
                    provider = provider.id(),
                    error = %error,
                    "provider connection failed"
                );
            }
        }
    }

    /// Computes the provider grouping bound into the namespace, narrowed by
    /// the pre-filter when a static query is known ahead of execution.
    async fn grouped_for_query(
        &self,
        static_query: Option<&str>,
    ) -> Vec<(String, Vec<ToolDescriptor>)> {
        let grouped = self.catalog.grouped();
        let (Some(prefilter), Some(query)) = (self.prefilter.as_ref(), static_query) else {
            return grouped;
        };
        if !prefilter.config().enabled {
            return grouped;
        }

        let outcome = prefilter
            .filter_tools(
                self.catalog.flattened(),
                Some(query),
                prefilter.config().use_reranking,
            )
            .await;
        tracing::debug!(
            before = self.catalog.total_tools(),
            after = outcome.len(),
            "static query narrowed the namespace"
        );
        regroup(outcome.tools, &grouped)
    }

    /// Evaluates the script on a blocking worker under the deadline.
    async fn run_under_deadline(
        &self,
        script: String,
        built: BuiltNamespace,
        logs: LogSink,
        timeout: Duration,
    ) -> EvalOutcome {
        let prefilter = self.prefilter.clone();
        let loop_limit = self.config.loop_iteration_limit;
        let task =
            spawn_blocking(move || evaluate(&script, &built, prefilter, loop_limit, &logs));

        match time::timeout(timeout, task).await {
            Ok(Ok(Ok(value))) => EvalOutcome::Value(value),
            Ok(Ok(Err(error))) => EvalOutcome::Failed(error.to_string()),
            Ok(Err(join_error)) => {
                EvalOutcome::Failed(format!("execution task failed: {join_error}"))
            }
            // The blocking worker keeps running detached; its output up to
            // this point is already in the shared sink, and the loop
            // iteration limit bounds how long until the thread terminates.
            Err(_elapsed) => EvalOutcome::TimedOut,
        }
    }
}

enum EvalOutcome {
    Value(Value),
    TimedOut,
    Failed(String),
}

/// Restores provider grouping, in original provider order, over a filtered
/// flat tool list. Providers whose tools were all filtered out drop from
/// the namespace entirely.
fn regroup(
    filtered: Vec<ToolDescriptor>,
    original: &[(String, Vec<ToolDescriptor>)],
) -> Vec<(String, Vec<ToolDescriptor>)> {
    original
        .iter()
        .filter_map(|(provider_id, _)| {
            let tools: Vec<ToolDescriptor> = filtered
                .iter()
                .filter(|tool| tool.provider_id == *provider_id)
                .cloned()
                .collect();
            if tools.is_empty() {
                None
            } else {
                Some((provider_id.clone(), tools))
            }
        })
        .collect()
}

fn snapshot_logs(logs: &LogSink) -> Vec<String> {
    logs.lock().map(|lines| lines.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(provider: &str, name: &str) -> ToolDescriptor {
        ToolDescriptor::new(provider, name, "test tool")
    }

    #[test]
    fn test_regroup_preserves_provider_order() {
        let original = vec![
            ("fs".to_owned(), vec![tool("fs", "read"), tool("fs", "write")]),
            ("net".to_owned(), vec![tool("net", "fetch")]),
        ];
        let filtered = vec![tool("net", "fetch"), tool("fs", "read")];

        let regrouped = regroup(filtered, &original);
        assert_eq!(regrouped.len(), 2);
        assert_eq!(regrouped[0].0, "fs");
        assert_eq!(regrouped[0].1.len(), 1);
        assert_eq!(regrouped[1].0, "net");
    }

    #[test]
    fn test_regroup_drops_emptied_providers() {
        let original = vec![
            ("fs".to_owned(), vec![tool("fs", "read")]),
            ("net".to_owned(), vec![tool("net", "fetch")]),
        ];
        let filtered = vec![tool("net", "fetch")];

        let regrouped = regroup(filtered, &original);
        assert_eq!(regrouped.len(), 1);
        assert_eq!(regrouped[0].0, "net");
    }
}
