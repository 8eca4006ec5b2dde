//! Shared data model for tool catalogs, filtering, and script execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A schema-described remote operation exposed by a provider.
///
/// Identity is the `(provider_id, name)` pair; `name` alone is not globally
/// unique because independent providers may expose tools with the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Identifier of the provider that owns this tool.
    pub provider_id: String,
    /// Tool name, unique within its provider.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON-schema-shaped description of the tool's parameters.
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Creates a descriptor with an empty object schema.
    pub fn new<P, N, D>(provider_id: P, name: N, description: D) -> Self
    where
        P: Into<String>,
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            provider_id: provider_id.into(),
            name: name.into(),
            description: description.into(),
            input_schema: Value::Object(serde_json::Map::new()),
        }
    }

    /// Replaces the parameter schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Result of catalog pre-filtering: tools paired with their original
/// catalog indices.
///
/// `tools` and `indices` are parallel arrays of equal length; when no
/// filtering applies the outcome carries every input tool in original order
/// with identity indices.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Surviving tools, most relevant first.
    pub tools: Vec<ToolDescriptor>,
    /// Index of each surviving tool in the original catalog.
    pub indices: Vec<usize>,
}

impl FilterOutcome {
    /// Builds an identity outcome: all tools, original order, indices `0..n`.
    pub fn identity(tools: Vec<ToolDescriptor>) -> Self {
        let indices = (0..tools.len()).collect();
        Self { tools, indices }
    }

    /// Number of surviving tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the outcome is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A single content item returned by a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Plain text payload.
    Text {
        /// The text content.
        text: String,
    },
    /// Binary payload, base64-encoded.
    Blob {
        /// MIME type of the payload.
        mime_type: String,
        /// Base64-encoded bytes.
        data: String,
    },
}

/// The full result of a tool invocation as returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolContent {
    /// Ordered content items.
    pub items: Vec<ContentItem>,
    /// Whether the provider reported the invocation as failed.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolContent {
    /// Creates a successful result with a single text item.
    pub fn text<T: Into<String>>(text: T) -> Self {
        Self {
            items: vec![ContentItem::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates a failed result carrying an error message.
    pub fn error<T: Into<String>>(message: T) -> Self {
        Self {
            items: vec![ContentItem::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Returns the first text-bearing content item, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            ContentItem::Text { text } => Some(text.as_str()),
            ContentItem::Blob { .. } => None,
        })
    }
}

/// Outcome of one sandboxed script execution.
///
/// `execute` never fails as a Rust `Result`; callers inspect `error` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Value the script returned, absent on failure or timeout.
    pub result: Option<Value>,
    /// Output captured line-by-line from the script's print function.
    pub logs: Vec<String>,
    /// Structured failure message, absent on success.
    pub error: Option<String>,
    /// Wall-clock time for the whole call, measured regardless of outcome.
    pub execution_time: Duration,
}

impl ExecutionResult {
    /// Builds a successful result.
    pub fn success(result: Value, logs: Vec<String>, execution_time: Duration) -> Self {
        Self {
            result: Some(result),
            logs,
            error: None,
            execution_time,
        }
    }

    /// Builds a failed result with no return value.
    pub fn failure<E: Into<String>>(
        error: E,
        logs: Vec<String>,
        execution_time: Duration,
    ) -> Self {
        Self {
            result: None,
            logs,
            error: Some(error.into()),
            execution_time,
        }
    }

    /// Whether the script completed without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Lifecycle states of the code executor, traced for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// No execution in flight.
    Idle,
    /// Connecting providers and building the namespace.
    Preparing,
    /// Script evaluation under the deadline.
    Running,
    /// Script finished and returned a value.
    Completed,
    /// The wall-clock deadline expired.
    TimedOut,
    /// Script evaluation failed.
    Failed,
}

impl core::fmt::Display for ExecutorState {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        };
        write!(formatter, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_outcome_parallel_arrays() {
        let tools = vec![
            ToolDescriptor::new("fs", "read_file", "Read a file"),
            ToolDescriptor::new("fs", "write_file", "Write a file"),
        ];
        let outcome = FilterOutcome::identity(tools.clone());
        assert_eq!(outcome.tools, tools);
        assert_eq!(outcome.indices, vec![0, 1]);
        assert_eq!(outcome.len(), outcome.indices.len());
    }

    #[test]
    fn test_first_text_skips_blobs() {
        let content = ToolContent {
            items: vec![
                ContentItem::Blob {
                    mime_type: "image/png".to_owned(),
                    data: "aGVsbG8=".to_owned(),
                },
                ContentItem::Text {
                    text: "caption".to_owned(),
                },
            ],
            is_error: false,
        };
        assert_eq!(content.first_text(), Some("caption"));
    }

    #[test]
    fn test_content_item_serde_shape() {
        let item = ContentItem::Text {
            text: "hello".to_owned(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hello"}));
    }

    #[test]
    fn test_execution_result_constructors() {
        let success = ExecutionResult::success(json!(2), Vec::new(), Duration::from_millis(5));
        assert!(success.is_success());
        assert_eq!(success.result, Some(json!(2)));

        let failure =
            ExecutionResult::failure("boom", vec!["line".to_owned()], Duration::from_millis(5));
        assert!(!failure.is_success());
        assert!(failure.result.is_none());
        assert_eq!(failure.logs, vec!["line".to_owned()]);
    }
}
