//! End-to-end executor tests over in-process mock providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use scriptor_core::{Error, Result, SandboxConfig, ToolContent, ToolDescriptor, ToolProvider};
use scriptor_sandbox::{Catalog, CodeExecutor};

/// In-process provider with deterministic tools and a countable session
/// lifecycle.
struct MockProvider {
    id: String,
    tools: Vec<ToolDescriptor>,
    connected: AtomicBool,
    connect_count: AtomicUsize,
}

impl MockProvider {
    fn new(id: &str, tool_names: &[&str]) -> Arc<Self> {
        let tools = tool_names
            .iter()
            .map(|name| {
                ToolDescriptor::new(id, *name, format!("The {name} tool from {id}"))
                    .with_schema(json!({ "type": "object", "properties": {} }))
            })
            .collect();
        Arc::new(Self {
            id: id.to_owned(),
            tools,
            connected: AtomicBool::new(false),
            connect_count: AtomicUsize::new(0),
        })
    }

    fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolContent> {
        match name {
            "add" => {
                let a = arguments["a"].as_i64().unwrap_or(0);
                let b = arguments["b"].as_i64().unwrap_or(0);
                Ok(ToolContent::text((a + b).to_string()))
            }
            "echo" => Ok(ToolContent::text(serde_json::to_string(&arguments)?)),
            "search" => Ok(ToolContent::text(
                json!({ "from": self.id, "hits": 1 }).to_string(),
            )),
            "fail" => Ok(ToolContent::error("disk full")),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(400)).await;
                Ok(ToolContent::text("done"))
            }
            other => Err(Error::Provider(format!("unknown tool '{other}'"))),
        }
    }

    async fn has_active_session(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn executor_with(providers: Vec<Arc<MockProvider>>) -> CodeExecutor {
    let mut catalog = Catalog::new();
    for provider in providers {
        catalog = catalog.with_provider(provider);
    }
    catalog.refresh().await;
    CodeExecutor::new(catalog, SandboxConfig::default())
}

#[tokio::test]
async fn test_return_value_round_trips() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let result = executor
        .execute("return 1 + 1", Duration::from_secs(5))
        .await;

    assert!(result.is_success(), "error: {:?}", result.error);
    assert_eq!(result.result, Some(json!(2)));
    assert!(result.logs.is_empty());
}

#[tokio::test]
async fn test_print_and_console_are_captured() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let script = r#"
        print("hello", 42);
        console.log("world");
        console.error("oh no");
        return "ok";
    "#;
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.is_success(), "error: {:?}", result.error);
    assert_eq!(result.result, Some(json!("ok")));
    assert_eq!(
        result.logs,
        vec![
            "hello 42".to_owned(),
            "console.log: world".to_owned(),
            "console.error: oh no".to_owned(),
        ]
    );
}

#[tokio::test]
async fn test_return_inside_block_is_legal() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let script = "for (const x of [1, 2, 3]) { if (x === 2) return x; }";
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.is_success(), "error: {:?}", result.error);
    assert_eq!(result.result, Some(json!(2)));
}

#[tokio::test]
async fn test_tool_call_through_namespace() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let script = "const sum = await math.add({ a: 2, b: 3 }); return sum;";
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.is_success(), "error: {:?}", result.error);
    assert_eq!(result.result, Some(json!(5)));
}

#[tokio::test]
async fn test_multiple_arguments_collapse_into_args_array() {
    let executor = executor_with(vec![MockProvider::new("util", &["echo"])]).await;

    let script = "return await util.echo(1, \"two\");";
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.is_success(), "error: {:?}", result.error);
    assert_eq!(result.result, Some(json!({ "args": [1, "two"] })));
}

#[tokio::test]
async fn test_tool_error_surfaces_without_raising() {
    let executor = executor_with(vec![MockProvider::new("fs", &["fail"])]).await;

    let script = "await fs.fail({}); return 1;";
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.result.is_none());
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("Tool invocation failed"), "got: {error}");
    assert!(error.contains("disk full"), "got: {error}");
}

#[tokio::test]
async fn test_deadline_abandons_slow_tool_call() {
    let executor = executor_with(vec![MockProvider::new("net", &["slow"])]).await;

    let script = r#"
        print("before");
        await net.slow({});
        return "never";
    "#;
    let start = std::time::Instant::now();
    let result = executor.execute(script, Duration::from_millis(100)).await;

    assert!(result.result.is_none());
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("timeout after"), "got: {error}");
    // Output captured before the deadline survives.
    assert_eq!(result.logs, vec!["before".to_owned()]);
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(result.execution_time >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_deadline_interrupts_busy_wait() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    // Pure CPU spin with no await points. The loop iteration limit makes
    // the detached worker terminate after the deadline abandons it, so
    // this test's runtime can shut down.
    let script = r"
        let total = 0;
        while (true) { total += 1; }
    ";
    let start = std::time::Instant::now();
    let result = executor.execute(script, Duration::from_millis(200)).await;

    assert!(result.result.is_none());
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("timeout after"), "got: {error}");
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_same_tool_name_across_providers_stays_distinct() {
    let executor = executor_with(vec![
        MockProvider::new("files", &["search"]),
        MockProvider::new("web", &["search"]),
    ])
    .await;

    let script = r#"
        const from_files = await files.search({ query: "logs" });
        const from_web = await web.search({ query: "logs" });
        const report = search_tools("search", "descriptions");
        return {
            files: from_files.from,
            web: from_web.from,
            found: report.results.length,
            total: report.meta.total_tools,
        };
    "#;
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.is_success(), "error: {:?}", result.error);
    let value = result.result.unwrap();
    assert_eq!(value["files"], "files");
    assert_eq!(value["web"], "web");
    assert_eq!(value["found"], 2);
    assert_eq!(value["total"], 2);
}

#[tokio::test]
async fn test_search_tools_detail_levels() {
    let executor = executor_with(vec![MockProvider::new("files", &["search", "echo"])]).await;

    let script = r#"
        const names = search_tools("search", "names");
        const full = search_tools("search", "full");
        return {
            name_only: names.results[0],
            with_schema: full.results[0],
        };
    "#;
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.is_success(), "error: {:?}", result.error);
    let value = result.result.unwrap();
    assert_eq!(value["name_only"]["tool"], "files.search");
    assert!(value["name_only"].get("description").is_none());
    assert!(value["with_schema"].get("input_schema").is_some());
}

#[tokio::test]
async fn test_providers_connect_lazily_and_once() {
    let provider = MockProvider::new("math", &["add"]);
    let executor = executor_with(vec![Arc::clone(&provider)]).await;
    assert_eq!(provider.connect_count(), 0);

    let first = executor
        .execute("return await math.add({ a: 1, b: 1 })", Duration::from_secs(5))
        .await;
    assert!(first.is_success(), "error: {:?}", first.error);
    assert_eq!(provider.connect_count(), 1);

    let second = executor.execute("return 0", Duration::from_secs(5)).await;
    assert!(second.is_success());
    assert_eq!(provider.connect_count(), 1);
}

#[tokio::test]
async fn test_syntax_error_reports_failure() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let result = executor
        .execute("return (;", Duration::from_secs(5))
        .await;

    assert!(result.result.is_none());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_reference_error_is_a_runtime_failure() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let result = executor
        .execute("return no_such_function();", Duration::from_secs(5))
        .await;

    assert!(result.result.is_none());
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("Script runtime error"), "got: {error}");
}

#[tokio::test]
async fn test_thrown_undefined_reports_failure() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let script = "await math.add({ a: 1, b: 1 }); throw undefined;";
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.result.is_none());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_promise_all_gathers_tool_calls() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let script = r#"
        const sums = await Promise.all([
            math.add({ a: 1, b: 2 }),
            math.add({ a: 10, b: 20 }),
        ]);
        return sums;
    "#;
    let result = executor.execute(script, Duration::from_secs(5)).await;

    assert!(result.is_success(), "error: {:?}", result.error);
    assert_eq!(result.result, Some(json!([3, 30])));
}

#[tokio::test]
async fn test_script_without_return_yields_null() {
    let executor = executor_with(vec![MockProvider::new("math", &["add"])]).await;

    let result = executor
        .execute("const x = 5;", Duration::from_secs(5))
        .await;

    assert!(result.is_success(), "error: {:?}", result.error);
    assert_eq!(result.result, Some(Value::Null));
}
