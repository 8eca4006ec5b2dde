//! Script wrapping so agent-authored bodies behave like function bodies.

/// Wrap a script so a top-level `return` is legal and top-level `await`
/// runs inside one async unit.
///
/// Detection is line-based and can miss a `return` nested inside a block;
/// the evaluator retries such scripts as a function body when the direct
/// evaluation fails to parse.
pub fn wrap_script(script: &str) -> String {
    let trimmed = script.trim();

    let has_await = trimmed.contains("await ");
    let has_return = trimmed
        .lines()
        .any(|line| line.trim_start().starts_with("return ") || line.trim() == "return;");

    if has_await {
        // Async IIFE: supports top-level await, result extracted from the
        // returned Promise after the job queue drains.
        format!("(async () => {{ {trimmed} }})()")
    } else if has_return {
        format!("(function() {{ {trimmed} }})()")
    } else {
        // Plain expression/statement sequences evaluate directly so the
        // last expression's value is the result.
        trimmed.to_owned()
    }
}
