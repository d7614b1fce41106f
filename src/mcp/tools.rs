//! Search tool definitions, argument decoding, and result shaping.

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	error::SearchError,
	search::{FilterInput, SearchMode, SearchRequest, SearchResponse, SortSpec},
};

/// Tool advertised through `tools/list`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDefinition {
	/// Tool name.
	pub name: &'static str,
	/// Human-readable description.
	pub description: &'static str,
	/// JSON schema of the arguments.
	#[serde(rename = "inputSchema")]
	pub input_schema: JsonValue,
}

/// Arguments shared by the three search tools.
///
/// Pagination accepts either `page`/`page_size` or the offset pair `start`/`size`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SearchArguments {
	/// Free-text query; may be empty when filters narrow the results.
	#[serde(default)]
	pub query: String,
	/// Filters in list or object form.
	#[serde(default)]
	pub filters: Option<FilterInput>,
	/// Sort keys in precedence order.
	#[serde(default)]
	pub sort: Option<Vec<SortSpec>>,
	/// 1-based page.
	#[serde(default)]
	pub page: Option<u32>,
	/// Results per page.
	#[serde(default)]
	pub page_size: Option<u32>,
	/// 0-based offset of the first result.
	#[serde(default)]
	pub start: Option<u64>,
	/// Results per page (offset form).
	#[serde(default)]
	pub size: Option<u32>,
}
impl SearchArguments {
	/// Builds the request and checks the fields `mode` requires.
	pub fn into_request(self, mode: SearchMode) -> Result<SearchRequest, SearchError> {
		let size = self.page_size.or(self.size).unwrap_or(SearchRequest::DEFAULT_PAGE_SIZE);
		let mut builder = SearchRequest::builder(self.query);

		builder = match self.page {
			Some(page) => builder.page(page).page_size(size),
			None => builder.offset(self.start.unwrap_or(0), size),
		};

		if let Some(filters) = self.filters {
			builder = builder.filters(filters.into_specs());
		}
		if let Some(sort) = self.sort {
			builder = builder.sorts(sort);
		}

		let request = builder.build()?;

		mode.validate(&request)?;

		Ok(request)
	}
}

/// `tools/call` result: a text block plus the same document as structured content.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolCallResult {
	/// Content blocks.
	pub content: Vec<ToolContent>,
	/// Machine-readable result or error payload.
	#[serde(rename = "structuredContent")]
	pub structured_content: JsonValue,
	/// True when the call failed.
	#[serde(rename = "isError")]
	pub is_error: bool,
}
impl ToolCallResult {
	/// Wraps a successful search.
	pub fn success(response: &SearchResponse) -> Result<Self, serde_json::Error> {
		Ok(Self::from_document(serde_json::to_value(response)?, false))
	}

	/// Wraps a failure as `{reason, message, status?, body?, attempts?}`.
	pub fn failure(err: &Error) -> Self {
		Self::from_document(error_payload(err), true)
	}

	fn from_document(document: JsonValue, is_error: bool) -> Self {
		Self {
			content: vec![ToolContent { kind: "text", text: document.to_string() }],
			structured_content: document,
			is_error,
		}
	}
}

/// One content block of a tool result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolContent {
	/// Block type; always `text`.
	#[serde(rename = "type")]
	pub kind: &'static str,
	/// Block text.
	pub text: String,
}

/// Maps a tool name to its search mode.
pub fn mode_for(name: &str) -> Option<SearchMode> {
	[SearchMode::Plain, SearchMode::Filtered, SearchMode::Sorted]
		.into_iter()
		.find(|mode| mode.tool_name() == name)
}

/// Structured error document returned to tool callers.
pub fn error_payload(err: &Error) -> JsonValue {
	let mut payload = serde_json::Map::new();

	payload.insert("reason".into(), json!(err.reason()));
	payload.insert("message".into(), json!(err.to_string()));

	if let Some(status) = err.status() {
		payload.insert("status".into(), json!(status));
	}
	if let Some(body) = err.upstream_body() {
		payload.insert("body".into(), json!(body));
	}
	if err.attempts() > 1 {
		payload.insert("attempts".into(), json!(err.attempts()));
	}

	JsonValue::Object(payload)
}

/// Definitions of `search`, `filtered_search`, and `sorted_search`.
pub fn definitions() -> Vec<ToolDefinition> {
	vec![
		ToolDefinition {
			name: SearchMode::Plain.tool_name(),
			description: "Execute a product search with optional filters and sorting.",
			input_schema: schema(&["query"]),
		},
		ToolDefinition {
			name: SearchMode::Filtered.tool_name(),
			description: "Search products with specific filters; at least one filter is required.",
			input_schema: schema(&["query", "filters"]),
		},
		ToolDefinition {
			name: SearchMode::Sorted.tool_name(),
			description: "Search products with custom sorting; at least one sort field is required.",
			input_schema: schema(&["query", "sort"]),
		},
	]
}

fn schema(required: &[&str]) -> JsonValue {
	let properties = json!({
		"query": {
			"type": "string",
			"description": "Search text (e.g. \"blue shirts\"); may be empty when filters are given."
		},
		"filters": {
			"description": "Filters as a list of {field, value, operator} or an object {field: value}.",
			"oneOf": [
				{
					"type": "array",
					"items": {
						"type": "object",
						"properties": {
							"field": { "type": "string" },
							"value": {},
							"operator": { "type": "string", "enum": ["eq", "range", "gte", "lte"], "default": "eq" }
						},
						"required": ["field", "value"]
					}
				},
				{ "type": "object" }
			]
		},
		"page": { "type": "integer", "minimum": 1, "description": "1-based page number." },
		"page_size": { "type": "integer", "minimum": 1, "default": 20 },
		"start": { "type": "integer", "minimum": 0, "description": "0-based offset; alternative to page." },
		"size": { "type": "integer", "minimum": 1, "description": "Results per page; alternative to page_size." },
		"sort": {
			"type": "array",
			"description": "Sort keys in precedence order.",
			"items": {
				"type": "object",
				"properties": {
					"field": { "type": "string" },
					"order": { "type": "string", "enum": ["asc", "desc"], "default": "desc" },
					"type": { "type": "string", "enum": ["number", "text", "date"], "default": "number" }
				},
				"required": ["field"]
			}
		}
	});

	json!({ "type": "object", "properties": properties, "required": required })
}
