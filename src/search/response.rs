//! Upstream search response mapping.

// self
use crate::{_prelude::*, error::SearchError, search::SearchRequest};

/// Pagination derived from the request and the upstream total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
	/// 1-based page returned.
	pub current_page: u64,
	/// Number of pages available (at least 1).
	pub total_pages: u64,
	/// Total matching products reported upstream.
	pub total_results: u64,
	/// Results per page requested.
	pub page_size: u32,
}
impl Pagination {
	/// Derives pagination for `request` given the upstream total.
	pub fn new(request: &SearchRequest, total_results: u64) -> Self {
		let page_size = u64::from(request.page_size());

		Self {
			current_page: request.start() / page_size + 1,
			total_pages: total_results.div_ceil(page_size).max(1),
			total_results,
			page_size: request.page_size(),
		}
	}
}

/// Result returned to tool callers; built per call and never retained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
	/// Product records in upstream order.
	pub results: Vec<JsonValue>,
	/// Pagination summary.
	pub pagination: Pagination,
	/// Facet data, when upstream supplied any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aggregations: Option<JsonValue>,
	/// Fuzzy query suggestions.
	#[serde(default)]
	pub suggestions: Vec<JsonValue>,
	/// Redirect information for queries mapped to a landing page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<JsonValue>,
	/// Wall time spent on the call, retries included.
	pub execution_time_ms: u64,
	/// HTTP status of the final upstream response.
	pub upstream_status: u16,
}
impl SearchResponse {
	/// Maps a 2xx upstream body. Reads the `payload` envelope, or the body itself without one.
	pub fn from_upstream(
		status: u16,
		body: &[u8],
		request: &SearchRequest,
		execution_time_ms: u64,
	) -> Result<Self, SearchError> {
		let malformed = |message: String| SearchError::MalformedResponse { status, message };
		let document: JsonValue =
			serde_json::from_slice(body).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
		let JsonValue::Object(mut root) = document else {
			return Err(malformed("response is not a JSON object".into()));
		};
		let payload = match root.remove("payload") {
			Some(JsonValue::Null) => return Err(malformed("`payload` is null".into())),
			Some(payload) => payload,
			None => JsonValue::Object(root),
		};
		let payload: UpstreamPayload = serde_path_to_error::deserialize(payload)
			.map_err(|e| malformed(format!("{} at payload.{}", e.inner(), e.path())))?;
		let total_results = payload.total_results.unwrap_or(0);

		Ok(Self {
			results: payload.results.unwrap_or_default(),
			pagination: Pagination::new(request, total_results),
			aggregations: payload.aggregations.filter(|value| !value.is_null()),
			suggestions: payload
				.suggestions
				.and_then(|suggestions| suggestions.fuzzy_suggestions)
				.unwrap_or_default(),
			redirect_url: payload.redirect_url.filter(|value| !value.is_null()),
			execution_time_ms,
			upstream_status: status,
		})
	}
}

#[derive(Deserialize)]
struct UpstreamPayload {
	#[serde(default)]
	results: Option<Vec<JsonValue>>,
	#[serde(default)]
	total_results: Option<u64>,
	#[serde(default)]
	aggregations: Option<JsonValue>,
	#[serde(default)]
	suggestions: Option<UpstreamSuggestions>,
	#[serde(default)]
	redirect_url: Option<JsonValue>,
}

#[derive(Deserialize)]
struct UpstreamSuggestions {
	#[serde(default)]
	fuzzy_suggestions: Option<Vec<JsonValue>>,
}
