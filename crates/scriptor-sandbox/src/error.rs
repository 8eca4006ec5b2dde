//! Sandbox-local error type.

use thiserror::Error;

/// Failure kinds raised inside the sandbox.
///
/// These never escape `execute()` as a Rust error; they are stringified into
/// `ExecutionResult.error` so callers inspect one field instead of catching.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script could not be parsed.
    #[error("Script compile error: {0}")]
    Compile(String),

    /// The script threw or evaluation failed.
    #[error("Script runtime error: {0}")]
    Runtime(String),

    /// A tool proxy call failed.
    #[error("{0}")]
    ToolInvocation(String),

    /// The wall-clock deadline expired.
    #[error("timeout after {0}s")]
    Timeout(f64),
}

/// Result type for sandbox internals.
pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_shape() {
        let error = ScriptError::Timeout(0.2);
        assert_eq!(error.to_string(), "timeout after 0.2s");
    }

    #[test]
    fn test_compile_error_prefix() {
        let error = ScriptError::Compile("SyntaxError: unexpected token".to_owned());
        assert!(error.to_string().starts_with("Script compile error:"));
    }
}
