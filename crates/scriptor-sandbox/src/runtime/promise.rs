//! Promise extraction for script results.
//!
//! Wrapped scripts with top-level `await` evaluate to a Promise; the
//! resolved value is pulled out here after the job queue has drained.

use boa_engine::property::Attribute;
use boa_engine::{Context, JsValue, Source};

use crate::error::{ScriptError, ScriptResult};

/// Extract the resolved value if `result` is a Promise; otherwise pass it
/// through unchanged.
///
/// # Errors
/// Returns a runtime error if the promise rejected or extraction fails.
pub fn extract_promise_if_needed(result: JsValue, context: &mut Context) -> ScriptResult<JsValue> {
    let Some(object) = result.as_object() else {
        return Ok(result);
    };

    let is_promise = object
        .get(boa_engine::js_string!("constructor"), context)
        .ok()
        .and_then(|constructor| constructor.as_object())
        .and_then(|constructor| {
            constructor
                .get(boa_engine::js_string!("name"), context)
                .ok()
        })
        .and_then(|name| {
            name.as_string()
                .map(|js_string| js_string.to_std_string_escaped())
        })
        .is_some_and(|name| name == "Promise");

    if !is_promise {
        return Ok(result);
    }

    context
        .register_global_property(
            boa_engine::js_string!("__scriptor_promise"),
            result,
            Attribute::all(),
        )
        .map_err(|error| ScriptError::Runtime(format!("failed to register promise: {error}")))?;

    // `var` rather than `let`: repeated extraction in one context must not
    // trip duplicate declaration errors. Rejection is tracked with a
    // separate flag because the rejection value itself may be `undefined`.
    let setup_handler = r"
        var __scriptor_result;
        var __scriptor_error;
        var __scriptor_rejected = false;
        __scriptor_promise.then(
            value => { __scriptor_result = value; },
            error => { __scriptor_rejected = true; __scriptor_error = error; }
        );
    ";

    context
        .eval(Source::from_bytes(setup_handler))
        .map_err(|error| {
            ScriptError::Runtime(format!("failed to set up promise handler: {error}"))
        })?;

    let _jobs = context.run_jobs();

    let rejected = context
        .eval(Source::from_bytes("__scriptor_rejected"))
        .map_err(|error| ScriptError::Runtime(format!("failed to check rejection: {error}")))?;
    if rejected.to_boolean() {
        let rejection = context
            .eval(Source::from_bytes("__scriptor_error"))
            .map_err(|error| {
                ScriptError::Runtime(format!("failed to extract rejection: {error}"))
            })?;
        let message = extract_error_message(&rejection, context);
        if message.contains("Tool invocation failed") {
            return Err(ScriptError::ToolInvocation(message));
        }
        return Err(ScriptError::Runtime(message));
    }

    context
        .eval(Source::from_bytes("__scriptor_result"))
        .map_err(|error| ScriptError::Runtime(format!("failed to extract promise value: {error}")))
}

/// Pull a readable message out of a thrown JS value.
pub fn extract_error_message(error_value: &JsValue, context: &mut Context) -> String {
    error_value.as_object().map_or_else(
        || format!("{error_value:?}"),
        |error_object| {
            let message = (|| {
                let value = error_object
                    .get(boa_engine::js_string!("message"), context)
                    .ok()?;
                value
                    .as_string()
                    .map(|js_string| js_string.to_std_string_escaped())
            })();
            message.unwrap_or_else(|| format!("{error_value:?}"))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_promise(context: &mut Context, source: &str) -> JsValue {
        let value = context.eval(Source::from_bytes(source)).unwrap();
        let _jobs = context.run_jobs();
        value
    }

    #[test]
    fn test_resolved_value_is_extracted() {
        let mut context = Context::default();
        let promise = eval_promise(&mut context, "(async () => 7)()");
        let extracted = extract_promise_if_needed(promise, &mut context).unwrap();
        assert_eq!(extracted.as_number(), Some(7.0));
    }

    #[test]
    fn test_non_promise_passes_through() {
        let mut context = Context::default();
        let value = JsValue::from(5);
        let extracted = extract_promise_if_needed(value.clone(), &mut context).unwrap();
        assert_eq!(extracted, value);
    }

    #[test]
    fn test_rejection_with_undefined_is_still_an_error() {
        let mut context = Context::default();
        let promise = eval_promise(&mut context, "(async () => { throw undefined; })()");
        let extracted = extract_promise_if_needed(promise, &mut context);
        assert!(extracted.is_err());
    }

    #[test]
    fn test_rejection_message_is_preserved() {
        let mut context = Context::default();
        let promise = eval_promise(
            &mut context,
            "(async () => { throw new Error('boom'); })()",
        );
        let error = extract_promise_if_needed(promise, &mut context).unwrap_err();
        assert!(error.to_string().contains("boom"));
    }
}
