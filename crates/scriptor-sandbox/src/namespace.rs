//! Namespace construction: per-provider proxy objects and catalog search.
//!
//! Proxies are registered as flat global callables with reserved-prefix
//! names; a generated JS prelude then assembles one frozen object per
//! provider so script code sees `provider.tool(...)` members. Separate
//! objects per provider mean tool names can never collide across providers.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{Value, json};

use scriptor_core::{ToolDescriptor, ToolProvider};
use scriptor_filter::SemanticPreFilter;

use crate::catalog::Catalog;

/// Words that cannot be used as namespace binding names in the prelude.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in", "instanceof",
    "let", "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var", "void",
    "while", "with", "yield", "print", "search_tools", "console", "Promise",
];

/// Sanitizes a tool or provider name into a JS identifier: non-alphanumeric
/// characters become underscores and digit-leading names get a prefix.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        sanitized.push('_');
    }
    if sanitized.starts_with(|character: char| character.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    if RESERVED.contains(&sanitized.as_str()) {
        sanitized.push('_');
    }
    sanitized
}

/// A callable bound into the execution namespace: the tool plus the
/// provider that owns it.
#[derive(Clone)]
pub struct ToolProxy {
    /// Provider the call is forwarded to.
    pub provider: Arc<dyn ToolProvider>,
    /// The tool being proxied.
    pub tool: ToolDescriptor,
}

/// One searchable catalog entry with its namespace placement.
#[derive(Clone)]
pub struct SearchEntry {
    /// Sanitized namespace (provider) binding name.
    pub namespace: String,
    /// Sanitized member name inside the namespace.
    pub member: String,
    /// The underlying descriptor.
    pub tool: ToolDescriptor,
}

/// Everything the runtime needs to assemble an execution namespace.
pub struct BuiltNamespace {
    /// Flat global binding name → proxy.
    pub proxies: HashMap<String, ToolProxy>,
    /// JS prelude assembling the per-provider namespace objects.
    pub prelude: String,
    /// Sanitized namespace names in provider registration order.
    pub namespaces: Vec<String>,
    /// Search entries for `search_tools`.
    pub entries: Vec<SearchEntry>,
}

impl BuiltNamespace {
    /// Total number of tools bound into the namespace.
    pub fn total_tools(&self) -> usize {
        self.entries.len()
    }
}

/// Builds execution namespaces from a catalog snapshot.
pub struct NamespaceBuilder<'catalog> {
    catalog: &'catalog Catalog,
}

impl<'catalog> NamespaceBuilder<'catalog> {
    /// Creates a builder over the given catalog.
    pub fn new(catalog: &'catalog Catalog) -> Self {
        Self { catalog }
    }

    /// Builds the namespace for the given provider→tools grouping.
    ///
    /// Within one provider, two tools sanitizing to the same member name
    /// resolve last-write-wins with a warning.
    pub fn build(&self, grouped: &[(String, Vec<ToolDescriptor>)]) -> BuiltNamespace {
        let mut proxies = HashMap::new();
        let mut entries = Vec::new();
        let mut namespaces = Vec::new();
        let mut prelude = String::new();

        for (provider_id, tools) in grouped {
            let Some(provider) = self.catalog.provider(provider_id) else {
                tracing::warn!(provider = provider_id.as_str(), "unknown provider in grouping, skipping");
                continue;
            };
            let mut namespace = sanitize_name(provider_id);
            // Two provider ids sanitizing alike must not collapse into one
            // prelude binding.
            while namespaces.contains(&namespace) {
                namespace.push('_');
            }

            // member name -> global binding, in first-seen order
            let mut members: Vec<(String, String)> = Vec::new();
            for tool in tools {
                let member = sanitize_name(&tool.name);
                let binding = format!("__scriptor_{namespace}_{member}");
                if let Some(existing) = proxies.insert(
                    binding.clone(),
                    ToolProxy {
                        provider: Arc::clone(&provider),
                        tool: tool.clone(),
                    },
                ) {
                    tracing::warn!(
                        provider = provider_id.as_str(),
                        member = member.as_str(),
                        first = existing.tool.name.as_str(),
                        second = tool.name.as_str(),
                        "sanitized tool names collide, keeping the later one"
                    );
                    entries.retain(|entry: &SearchEntry| {
                        !(entry.namespace == namespace && entry.member == member)
                    });
                } else {
                    members.push((member.clone(), binding));
                }
                entries.push(SearchEntry {
                    namespace: namespace.clone(),
                    member,
                    tool: tool.clone(),
                });
            }

            let member_list = members
                .iter()
                .map(|(member, binding)| format!("{member}: {binding}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                prelude,
                "const {namespace} = Object.freeze({{ {member_list} }});"
            );
            namespaces.push(namespace);
        }

        BuiltNamespace {
            proxies,
            prelude,
            namespaces,
            entries,
        }
    }
}

/// Requested verbosity for `search_tools` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// Namespace-qualified names only.
    Names,
    /// Names plus descriptions.
    Descriptions,
    /// Names, descriptions, and parameter schemas.
    Full,
}

impl DetailLevel {
    /// Parses a detail level, defaulting to descriptions.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("names") => Self::Names,
            Some("full") => Self::Full,
            _ => Self::Descriptions,
        }
    }
}

/// Case-insensitive substring match over name, description, and provider.
pub fn substring_matches<'entries>(
    entries: &'entries [SearchEntry],
    query: &str,
) -> Vec<&'entries SearchEntry> {
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|entry| {
            entry.tool.name.to_lowercase().contains(&needle)
                || entry.tool.description.to_lowercase().contains(&needle)
                || entry.tool.provider_id.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Renders one search result at the requested detail level.
pub fn render_entry(entry: &SearchEntry, detail: DetailLevel) -> Value {
    let mut result = json!({
        "tool": format!("{}.{}", entry.namespace, entry.member),
        "provider": entry.tool.provider_id,
    });
    if matches!(detail, DetailLevel::Descriptions | DetailLevel::Full) {
        result["description"] = Value::String(entry.tool.description.clone());
    }
    if matches!(detail, DetailLevel::Full) {
        result["input_schema"] = entry.tool.input_schema.clone();
    }
    result
}

/// Assembles the `search_tools` response envelope.
pub fn search_response(
    results: Vec<Value>,
    total_tools: usize,
    namespace_count: usize,
) -> Value {
    json!({
        "meta": {
            "total_tools": total_tools,
            "namespaces": namespace_count,
            "result_count": results.len(),
        },
        "results": results,
    })
}

/// Answers a catalog search, routing through the semantic pre-filter for
/// catalogs above the configured threshold.
pub fn search_catalog(
    entries: &[SearchEntry],
    query: &str,
    detail: DetailLevel,
    namespace_count: usize,
    prefilter: Option<&Arc<SemanticPreFilter>>,
) -> Value {
    let total = entries.len();

    let semantic = prefilter.filter(|filter| {
        filter.config().enabled && total > filter.config().search_threshold
    });

    let results: Vec<Value> = match semantic {
        Some(filter) => semantic_matches(entries, query, filter)
            .iter()
            .map(|entry| render_entry(entry, detail))
            .collect(),
        None => substring_matches(entries, query)
            .into_iter()
            .map(|entry| render_entry(entry, detail))
            .collect(),
    };

    search_response(results, total, namespace_count)
}

/// Runs the pre-filter synchronously from the sandbox thread.
///
/// The Boa callable is synchronous while the filter is async; a scoped
/// thread with its own current-thread runtime bridges the two without
/// touching the outer runtime's context.
fn semantic_matches<'entries>(
    entries: &'entries [SearchEntry],
    query: &str,
    prefilter: &Arc<SemanticPreFilter>,
) -> Vec<&'entries SearchEntry> {
    use std::thread::scope;
    use tokio::runtime::Builder;

    let tools: Vec<ToolDescriptor> = entries.iter().map(|entry| entry.tool.clone()).collect();
    let filter = Arc::clone(prefilter);
    let use_reranking = prefilter.config().use_reranking;
    let query_owned = query.to_owned();

    let outcome = scope(|scope_context| {
        scope_context
            .spawn(move || {
                let runtime = Builder::new_current_thread().enable_all().build().ok()?;
                Some(runtime.block_on(async move {
                    filter
                        .filter_tools(tools, Some(&query_owned), use_reranking)
                        .await
                }))
            })
            .join()
            .ok()
            .flatten()
    });

    let Some(outcome) = outcome else {
        tracing::warn!("semantic search unavailable, falling back to substring matching");
        return substring_matches(entries, query);
    };

    outcome
        .tools
        .iter()
        .filter_map(|tool| {
            entries.iter().find(|entry| {
                entry.tool.provider_id == tool.provider_id && entry.tool.name == tool.name
            })
        })
        .collect()
}

/// Renders a human-readable listing of everything callable from script
/// code, one JSDoc-style block per tool.
pub fn render_signatures(built: &BuiltNamespace) -> String {
    let mut signatures = String::from("// Available tool functions\n\n");
    for entry in &built.entries {
        let _ = write!(
            signatures,
            "/**\n * {}\n */\nasync function {}.{}(params: object): Promise<any>;\n\n",
            entry.tool.description, entry.namespace, entry.member
        );
    }
    signatures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_name() {
        assert_eq!(sanitize_name("read_file"), "read_file");
        assert_eq!(sanitize_name("readFile"), "readFile");
    }

    #[test]
    fn test_sanitize_special_characters() {
        assert_eq!(sanitize_name("repo/search-issues"), "repo_search_issues");
        assert_eq!(sanitize_name("a.b.c"), "a_b_c");
    }

    #[test]
    fn test_sanitize_digit_leading() {
        assert_eq!(sanitize_name("2fa_reset"), "_2fa_reset");
    }

    #[test]
    fn test_sanitize_empty_and_reserved() {
        assert_eq!(sanitize_name(""), "_");
        assert_eq!(sanitize_name("new"), "new_");
        assert_eq!(sanitize_name("print"), "print_");
    }

    #[test]
    fn test_detail_level_parse() {
        assert_eq!(DetailLevel::parse(Some("names")), DetailLevel::Names);
        assert_eq!(DetailLevel::parse(Some("full")), DetailLevel::Full);
        assert_eq!(
            DetailLevel::parse(Some("descriptions")),
            DetailLevel::Descriptions
        );
        assert_eq!(DetailLevel::parse(None), DetailLevel::Descriptions);
    }

    #[test]
    fn test_substring_matches_are_case_insensitive() {
        let entries = vec![
            SearchEntry {
                namespace: "fs".to_owned(),
                member: "read_file".to_owned(),
                tool: ToolDescriptor::new("fs", "read_file", "Read a File from disk"),
            },
            SearchEntry {
                namespace: "net".to_owned(),
                member: "fetch_url".to_owned(),
                tool: ToolDescriptor::new("net", "fetch_url", "Fetch a URL"),
            },
        ];

        let matches = substring_matches(&entries, "FILE");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tool.name, "read_file");

        // Provider ids are searchable too.
        let matches = substring_matches(&entries, "net");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tool.name, "fetch_url");
    }

    #[test]
    fn test_render_entry_detail_levels() {
        let entry = SearchEntry {
            namespace: "fs".to_owned(),
            member: "read_file".to_owned(),
            tool: ToolDescriptor::new("fs", "read_file", "Read a file"),
        };

        let names = render_entry(&entry, DetailLevel::Names);
        assert_eq!(names["tool"], "fs.read_file");
        assert!(names.get("description").is_none());

        let descriptions = render_entry(&entry, DetailLevel::Descriptions);
        assert_eq!(descriptions["description"], "Read a file");
        assert!(descriptions.get("input_schema").is_none());

        let full = render_entry(&entry, DetailLevel::Full);
        assert!(full.get("input_schema").is_some());
    }
}
