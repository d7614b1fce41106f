//! Read-only documentation resources.
//!
//! The documents describe the tools, the response shape, and ready-made calls. They are
//! static and never embed the client identity or any secret.

// crates.io
use serde_json::json;
// self
use crate::_prelude::*;

/// URI of the tool documentation.
pub const DOCS_URI: &str = "resource://search/docs";
/// URI of the response schema.
pub const RESPONSE_SCHEMA_URI: &str = "resource://search/response-schema";
/// URI of the example calls.
pub const EXAMPLES_URI: &str = "resource://search/examples";

const MIME_TYPE: &str = "application/json";

/// Resource advertised through `resources/list`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
	/// Resource URI.
	pub uri: &'static str,
	/// Display name.
	pub name: &'static str,
	/// Human-readable description.
	pub description: &'static str,
	/// MIME type of the contents.
	#[serde(rename = "mimeType")]
	pub mime_type: &'static str,
}

/// Contents returned by `resources/read`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceContents {
	/// Resource URI.
	pub uri: &'static str,
	/// MIME type of `text`.
	#[serde(rename = "mimeType")]
	pub mime_type: &'static str,
	/// Pretty-printed JSON document.
	pub text: String,
}

/// All resources, in a stable order.
pub fn list() -> Vec<ResourceDescriptor> {
	vec![
		ResourceDescriptor {
			uri: DOCS_URI,
			name: "Search Documentation",
			description: "Parameters, filter operators, and sort options of the search tools.",
			mime_type: MIME_TYPE,
		},
		ResourceDescriptor {
			uri: RESPONSE_SCHEMA_URI,
			name: "Search Response Schema",
			description: "JSON schema of the document every search tool returns.",
			mime_type: MIME_TYPE,
		},
		ResourceDescriptor {
			uri: EXAMPLES_URI,
			name: "Search Examples",
			description: "Ready-to-use tool calls for common search patterns.",
			mime_type: MIME_TYPE,
		},
	]
}

/// Reads the resource at `uri`.
pub fn read(uri: &str) -> Option<ResourceContents> {
	let (uri, document) = match uri {
		DOCS_URI => (DOCS_URI, docs()),
		RESPONSE_SCHEMA_URI => (RESPONSE_SCHEMA_URI, response_schema()),
		EXAMPLES_URI => (EXAMPLES_URI, examples()),
		_ => return None,
	};
	let text = serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string());

	Some(ResourceContents { uri, mime_type: MIME_TYPE, text })
}

fn docs() -> JsonValue {
	json!({
		"tools": {
			"search": {
				"description": "Product search with optional filters.",
				"parameters": ["query", "filters", "page", "page_size", "start", "size"]
			},
			"filtered_search": {
				"description": "Product search that requires at least one filter.",
				"parameters": ["query", "filters", "page", "page_size", "start", "size"]
			},
			"sorted_search": {
				"description": "Product search that requires at least one sort key; filters optional.",
				"parameters": ["query", "sort", "filters", "page", "page_size", "start", "size"]
			}
		},
		"pagination": {
			"page": "1-based page number; takes precedence over start.",
			"page_size": "Results per page (default 20).",
			"start": "0-based offset of the first result; resolved to the page containing it.",
			"size": "Results per page when paging by offset."
		},
		"filters": {
			"forms": [
				"[{\"field\": \"color\", \"value\": \"blue\", \"operator\": \"eq\"}]",
				"{\"color\": \"blue\", \"price\": {\"min\": 20, \"max\": 100}}"
			],
			"operators": {
				"eq": "Field equals value. A later eq on the same field replaces the earlier one.",
				"range": "Value is an object with min and/or max.",
				"gte": "Value is the lower bound; merges with an upper bound on the same field.",
				"lte": "Value is the upper bound; merges with a lower bound on the same field."
			}
		},
		"sorting": {
			"field": "Field to sort by, e.g. price or popularity.",
			"order": { "enum": ["asc", "desc"], "default": "desc" },
			"type": { "enum": ["number", "text", "date"], "default": "number" },
			"precedence": "Earlier sort keys take precedence over later ones."
		},
		"errors": {
			"shape": { "reason": "string", "message": "string", "status": "integer?", "body": "string?", "attempts": "integer?" },
			"reasons": [
				"invalid_credentials",
				"endpoint_unreachable",
				"malformed_response",
				"missing_required_filter",
				"missing_sort_spec",
				"invalid_request",
				"upstream_error",
				"network_failure",
				"configuration"
			]
		},
		"authentication": "Handled by the server; callers never supply credentials."
	})
}

fn response_schema() -> JsonValue {
	json!({
		"type": "object",
		"required": ["results", "pagination", "suggestions", "execution_time_ms", "upstream_status"],
		"properties": {
			"results": {
				"type": "array",
				"description": "Product records in upstream order; fields depend on the catalog.",
				"items": { "type": "object" }
			},
			"pagination": {
				"type": "object",
				"properties": {
					"current_page": { "type": "integer", "minimum": 1 },
					"total_pages": { "type": "integer", "minimum": 1 },
					"total_results": { "type": "integer", "minimum": 0 },
					"page_size": { "type": "integer", "minimum": 1 }
				}
			},
			"aggregations": { "type": "object", "description": "Facet data, when available." },
			"suggestions": {
				"type": "array",
				"description": "Fuzzy suggestions for the query.",
				"items": { "type": "string" }
			},
			"redirect_url": { "type": "object", "description": "Landing page for the query, when configured." },
			"execution_time_ms": { "type": "integer", "description": "Wall time including retries." },
			"upstream_status": { "type": "integer", "description": "HTTP status of the final upstream response." }
		}
	})
}

fn examples() -> JsonValue {
	json!({
		"basic_search": {
			"tool": "search",
			"arguments": { "query": "blue shirt", "page": 1, "page_size": 20 }
		},
		"offset_paging": {
			"tool": "search",
			"arguments": { "query": "tyres tires wheels", "start": 15, "size": 15 }
		},
		"category_filter": {
			"tool": "filtered_search",
			"arguments": {
				"query": "",
				"filters": [{ "field": "product_category", "value": "Clothing > Shirts", "operator": "eq" }]
			}
		},
		"price_range": {
			"tool": "filtered_search",
			"arguments": {
				"query": "dress",
				"filters": [{ "field": "price", "value": { "min": 29.99, "max": 99.99 }, "operator": "range" }]
			}
		},
		"cheapest_first": {
			"tool": "sorted_search",
			"arguments": { "query": "laptop", "sort": [{ "field": "price", "order": "asc", "type": "number" }] }
		},
		"filtered_and_sorted": {
			"tool": "sorted_search",
			"arguments": {
				"query": "sneakers",
				"sort": [
					{ "field": "popularity", "order": "desc" },
					{ "field": "price", "order": "asc" }
				],
				"filters": { "brand": "Nike", "price": { "min": 50, "max": 150 } }
			}
		}
	})
}
