//! Restricted JavaScript runtime using the Boa engine.
//!
//! Each evaluation gets a fresh `Context` holding only the generated
//! provider namespaces, `search_tools`, `print`, and a `console` shim.
//! Boa's default context has no file, network, process, or module access,
//! which is exactly the isolation contract: best effort for well-behaved
//! script authors, not a security boundary.

mod conversion;
mod promise;
mod wrap;

pub use conversion::{js_value_to_json, json_to_js_value};
pub use promise::{extract_error_message, extract_promise_if_needed};
pub use wrap::wrap_script;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::scope;

use boa_engine::{Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source};
use serde_json::{Value, json};
use tokio::runtime::Builder;

use scriptor_core::ToolContent;
use scriptor_filter::SemanticPreFilter;

use crate::error::{ScriptError, ScriptResult};
use crate::namespace::{BuiltNamespace, DetailLevel, SearchEntry, ToolProxy, search_catalog};

/// Shared sink for output captured from the script's print channels.
pub type LogSink = Arc<Mutex<Vec<String>>>;

/// Console shim wired to the tagged capture channels.
const CONSOLE_PRELUDE: &str =
    "const console = Object.freeze({ log: __scriptor_console_log, error: __scriptor_console_error });\n";

/// Evaluates a script in a fresh restricted context.
///
/// # Errors
/// Returns a `ScriptError` describing the failure kind; the caller folds it
/// into `ExecutionResult.error`.
pub fn evaluate(
    script: &str,
    namespace: &BuiltNamespace,
    prefilter: Option<Arc<SemanticPreFilter>>,
    loop_iteration_limit: u64,
    logs: &LogSink,
) -> ScriptResult<Value> {
    let mut context = Context::default();
    // Bounds abandoned busy-wait workers: the deadline only detaches the
    // evaluation, this makes the detached thread terminate on its own.
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(loop_iteration_limit);

    register_capture_channels(&mut context, logs)?;
    register_proxies(&mut context, &namespace.proxies)?;
    register_search(
        &mut context,
        namespace.entries.clone(),
        namespace.namespaces.len(),
        prefilter,
    )?;

    let prelude = format!("{CONSOLE_PRELUDE}{}", namespace.prelude);
    context
        .eval(Source::from_bytes(prelude.as_bytes()))
        .map_err(|error| ScriptError::Runtime(format!("namespace prelude failed: {error}")))?;

    let wrapped = wrap_script(script);
    let evaluated = match context.eval(Source::from_bytes(wrapped.as_bytes())) {
        // A `return` nested inside a block escapes the line-based wrap
        // detection; retry the body as a function before reporting.
        Err(error)
            if wrapped == script.trim() && is_stray_return(&error.to_string()) =>
        {
            let retried = format!("(function() {{ {} }})()", script.trim());
            context.eval(Source::from_bytes(retried.as_bytes()))
        }
        other => other,
    };
    let result = evaluated.map_err(|error| classify_eval_error(&error.to_string()))?;

    // Drain the job queue so pending promise reactions run.
    let _jobs = context.run_jobs();

    let resolved = extract_promise_if_needed(result, &mut context)?;
    js_value_to_json(&resolved, &mut context)
        .map_err(|error| ScriptError::Runtime(format!("result conversion failed: {error}")))
}

/// Whether a parse failure is a top-level `return` the direct evaluation
/// path cannot host.
fn is_stray_return(message: &str) -> bool {
    message.contains("SyntaxError") && message.contains("return")
}

/// Maps a Boa evaluation error onto the sandbox failure kinds.
fn classify_eval_error(message: &str) -> ScriptError {
    if message.contains("SyntaxError") {
        ScriptError::Compile(message.to_owned())
    } else if message.contains("Tool invocation failed") {
        ScriptError::ToolInvocation(message.to_owned())
    } else {
        ScriptError::Runtime(message.to_owned())
    }
}

/// Registers `print` plus the tagged `console` capture channels.
fn register_capture_channels(context: &mut Context, logs: &LogSink) -> ScriptResult<()> {
    register_sink(context, "print", None, logs)?;
    register_sink(context, "__scriptor_console_log", Some("console.log"), logs)?;
    register_sink(
        context,
        "__scriptor_console_error",
        Some("console.error"),
        logs,
    )?;
    Ok(())
}

fn register_sink(
    context: &mut Context,
    binding: &str,
    tag: Option<&str>,
    logs: &LogSink,
) -> ScriptResult<()> {
    let sink = Arc::clone(logs);
    let tag = tag.map(str::to_owned);

    #[allow(
        unsafe_code,
        reason = "Closure captures only Arc-backed state that outlives the context"
    )]
    let func = unsafe {
        NativeFunction::from_closure(move |_this, args, ctx| {
            let line = render_arguments(args, ctx)?;
            let tagged = match &tag {
                Some(tag) => format!("{tag}: {line}"),
                None => line,
            };
            if let Ok(mut lines) = sink.lock() {
                lines.push(tagged);
            }
            Ok(JsValue::undefined())
        })
    };

    context
        .register_global_callable(JsString::from(binding), 0, func)
        .map_err(|error| {
            ScriptError::Runtime(format!("failed to register '{binding}': {error}"))
        })?;
    Ok(())
}

/// Renders print arguments the way script authors expect: bare strings
/// stay unquoted, everything else is compact JSON.
fn render_arguments(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    let mut rendered = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(text) = arg.as_string() {
            rendered.push(text.to_std_string_escaped());
        } else {
            let value = js_value_to_json(arg, context)?;
            rendered.push(serde_json::to_string(&value).unwrap_or_default());
        }
    }
    Ok(rendered.join(" "))
}

/// Registers every tool proxy as a flat global callable.
///
/// The proxy forwards its arguments to the originating provider, awaits the
/// single result, and collapses it to a plain return value.
fn register_proxies(
    context: &mut Context,
    proxies: &HashMap<String, ToolProxy>,
) -> ScriptResult<()> {
    for (binding, proxy) in proxies {
        let proxy = proxy.clone();
        let qualified = format!("{}.{}", proxy.tool.provider_id, proxy.tool.name);

        #[allow(
            unsafe_code,
            reason = "Closure captures only Arc-backed state that outlives the context"
        )]
        let func = unsafe {
            NativeFunction::from_closure(move |_this, args, ctx| {
                tracing::debug!(tool = qualified.as_str(), "proxy called from script");
                let arguments = collapse_arguments(args, ctx)?;
                let content = invoke_blocking(&proxy, arguments).map_err(|error| {
                    JsNativeError::error()
                        .with_message(format!("Tool invocation failed for '{qualified}': {error}"))
                })?;

                if content.is_error {
                    let message = content.first_text().unwrap_or("unknown error").to_owned();
                    return Err(JsNativeError::error()
                        .with_message(format!(
                            "Tool invocation failed for '{qualified}': {message}"
                        ))
                        .into());
                }

                let collapsed = collapse_content(&content);
                json_to_js_value(&collapsed, ctx)
            })
        };

        context
            .register_global_callable(JsString::from(binding.as_str()), 0, func)
            .map_err(|error| {
                ScriptError::Runtime(format!("failed to register proxy '{binding}': {error}"))
            })?;
    }
    Ok(())
}

/// Collapses proxy call arguments into one arguments value: none becomes an
/// empty object, one passes through, several become `{ args: [...] }`.
fn collapse_arguments(args: &[JsValue], context: &mut Context) -> JsResult<Value> {
    if args.is_empty() {
        Ok(json!({}))
    } else if args.len() == 1 {
        js_value_to_json(&args[0], context)
    } else {
        let mut converted = Vec::with_capacity(args.len());
        for arg in args {
            converted.push(js_value_to_json(arg, context)?);
        }
        Ok(json!({ "args": converted }))
    }
}

/// Runs the async provider call from the synchronous Boa callable.
///
/// Spawned on a fresh OS thread with its own current-thread runtime: the
/// sandbox thread is a `spawn_blocking` worker whose runtime context cannot
/// host another `block_on`.
fn invoke_blocking(proxy: &ToolProxy, arguments: Value) -> Result<ToolContent, String> {
    let provider = Arc::clone(&proxy.provider);
    let tool_name = proxy.tool.name.clone();

    scope(|scope_context| {
        scope_context
            .spawn(move || -> Result<ToolContent, String> {
                let runtime = Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|error| format!("failed to create runtime: {error}"))?;
                runtime.block_on(async move {
                    provider
                        .call_tool(&tool_name, arguments)
                        .await
                        .map_err(|error| error.to_string())
                })
            })
            .join()
            .map_err(|_| "tool call panicked".to_owned())?
    })
}

/// Collapses a provider result to a plain value: first text-bearing content
/// item, parsed as JSON when possible, else the raw string.
fn collapse_content(content: &ToolContent) -> Value {
    match content.first_text() {
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned())),
        None => Value::Null,
    }
}

/// Registers the catalog-wide `search_tools(query, detail_level)` function.
fn register_search(
    context: &mut Context,
    entries: Vec<SearchEntry>,
    namespace_count: usize,
    prefilter: Option<Arc<SemanticPreFilter>>,
) -> ScriptResult<()> {
    #[allow(
        unsafe_code,
        reason = "Closure captures only Arc-backed state that outlives the context"
    )]
    let func = unsafe {
        NativeFunction::from_closure(move |_this, args, ctx| {
            let query = args
                .first()
                .and_then(JsValue::as_string)
                .map(|text| text.to_std_string_escaped())
                .unwrap_or_default();
            let detail = args
                .get(1)
                .and_then(JsValue::as_string)
                .map(|text| text.to_std_string_escaped());
            let detail = DetailLevel::parse(detail.as_deref());

            let response =
                search_catalog(&entries, &query, detail, namespace_count, prefilter.as_ref());
            json_to_js_value(&response, ctx)
        })
    };

    context
        .register_global_callable(boa_engine::js_string!("search_tools"), 0, func)
        .map_err(|error| {
            ScriptError::Runtime(format!("failed to register search_tools: {error}"))
        })?;
    Ok(())
}
