//! On-demand code context for `get_context` tool calls.
//!
//! The assistant asks for definitions of entities it saw in a diff; the
//! repository implementation finds them in the project tree with a
//! per-category declaration pattern and returns the surrounding block.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{ReviewError, ReviewResult};
use crate::workspace::{scan_project, SourceFile};

/// Longest snippet returned for one definition.
pub const MAX_SNIPPET_LINES: usize = 40;

/// Local computation behind the on-demand context functions.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Render context for the JSON arguments of one tool call.
    async fn code_context(&self, arguments: &Value) -> ReviewResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContextRequest {
    #[serde(default)]
    pub entity_category: Option<String>,
    pub context_required_entity: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContextArguments {
    requests: Vec<ContextRequest>,
}

/// Shape the remote side uses when it batches calls as `multi_tool_use.parallel`.
#[derive(Debug, Deserialize)]
struct ParallelArguments {
    tool_uses: Vec<ParallelToolUse>,
}

#[derive(Debug, Deserialize)]
struct ParallelToolUse {
    #[serde(default)]
    parameters: Value,
}

/// Extract every context request from a tool call's arguments.
pub fn parse_context_requests(arguments: &Value) -> ReviewResult<Vec<ContextRequest>> {
    if let Ok(parallel) = ParallelArguments::deserialize(arguments) {
        let mut requests = Vec::new();
        for tool_use in &parallel.tool_uses {
            requests.extend(parse_context_requests(&tool_use.parameters)?);
        }
        return Ok(requests);
    }
    if let Ok(args) = ContextArguments::deserialize(arguments) {
        return Ok(args.requests);
    }
    if let Ok(single) = ContextRequest::deserialize(arguments) {
        return Ok(vec![single]);
    }
    Err(ReviewError::MalformedResponse(format!(
        "unrecognized get_context arguments: {}",
        arguments
    )))
}

fn definition_pattern(category: Option<&str>, entity: &str) -> ReviewResult<Regex> {
    let name = regex::escape(entity);
    let function = format!(
        r"\b(fn|def|function|func|fun)\s+{name}\b|\b{name}\s*[:=]\s*(async\s+)?(function\b|\([^)]*\)\s*=>)"
    );
    let class = format!(r"\b(class|struct|enum|trait|interface|type|record|object|union)\s+{name}\b");
    let variable =
        format!(r"\b(let|const|var|static|val)\s+(mut\s+)?{name}\b|^\s*{name}\s*(:[^=]+)?=[^=]");
    let module = format!(r"\b(mod|module|namespace|package)\s+{name}\b");

    let pattern = match category.map(str::to_ascii_lowercase).as_deref() {
        Some("function") | Some("method") => function,
        Some("class") | Some("type") | Some("struct") | Some("interface") => class,
        Some("variable") | Some("constant") => variable,
        Some("module") | Some("namespace") => module,
        _ => format!("{}|{}|{}|{}", function, class, variable, module),
    };

    Regex::new(&pattern).map_err(|e| {
        ReviewError::MalformedResponse(format!("cannot search for entity {}: {}", entity, e))
    })
}

/// Lines of the block that starts at `start`, ending where its braces balance.
fn extract_block(lines: &[&str], start: usize) -> String {
    let mut depth: i64 = 0;
    let mut opened = false;
    let mut end = start;

    for (index, line) in lines.iter().enumerate().skip(start).take(MAX_SNIPPET_LINES) {
        end = index;
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            break;
        }
        if !opened && index == start && line.trim_end().ends_with(';') {
            break;
        }
    }

    lines[start..=end].join("\n")
}

struct Definition<'f> {
    path: &'f str,
    line_number: usize,
    snippet: String,
}

fn find_definition<'f>(
    files: &'f [SourceFile],
    request: &ContextRequest,
) -> ReviewResult<Option<Definition<'f>>> {
    let pattern = definition_pattern(
        request.entity_category.as_deref(),
        &request.context_required_entity,
    )?;

    // Files matching the requested filename are searched first.
    let preferred = request.filename.as_deref().filter(|name| !name.is_empty());
    let ordered = files
        .iter()
        .filter(|f| preferred.map_or(false, |name| f.path.ends_with(name)))
        .chain(
            files
                .iter()
                .filter(|f| !preferred.map_or(false, |name| f.path.ends_with(name))),
        );

    for file in ordered {
        let lines: Vec<&str> = file.content.lines().collect();
        if let Some(index) = lines.iter().position(|line| pattern.is_match(line)) {
            return Ok(Some(Definition {
                path: &file.path,
                line_number: index + 1,
                snippet: extract_block(&lines, index),
            }));
        }
    }

    Ok(None)
}

/// Render the answer to a batch of requests against a set of files.
pub fn render_context(files: &[SourceFile], requests: &[ContextRequest]) -> ReviewResult<String> {
    let mut sections = Vec::with_capacity(requests.len());

    for request in requests {
        let entity = &request.context_required_entity;
        match find_definition(files, request)? {
            Some(definition) => sections.push(format!(
                "{} defined in {}:{}\n```\n{}\n```",
                entity, definition.path, definition.line_number, definition.snippet
            )),
            None => sections.push(format!("No definition found for {}", entity)),
        }
    }

    Ok(sections.join("\n\n"))
}

/// [`ContextProvider`] that searches the project's source tree.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    root: PathBuf,
}

impl RepositoryContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContextProvider for RepositoryContext {
    async fn code_context(&self, arguments: &Value) -> ReviewResult<String> {
        let requests = parse_context_requests(arguments)?;
        if requests.is_empty() {
            return Ok(String::new());
        }
        debug!("Resolving {} context request(s)", requests.len());

        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let files = scan_project(&root);
            render_context(&files, &requests)
        })
        .await
        .map_err(|e| ReviewError::InvalidState(format!("context lookup task failed: {}", e)))?
    }
}
