//! Search proxy: validates a request for its mode, attaches the bearer token, calls the
//! upstream search endpoint under the retry policy, and maps the response.
//!
//! A 401 from the search endpoint invalidates the token it was sent with and the request is
//! replayed once with a freshly obtained token. Credential failures keep their auth reason
//! (`invalid_credentials`, `endpoint_unreachable`, ...) so callers can tell a bad secret from a
//! search outage.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Instant,
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ClientId, ClientShortcode, Credentials, TokenCache},
	error::{ConfigError, SearchError},
	http::{CallTarget, HttpRequest, HttpResponse, ProxyHttpClient, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
	retry::RetryPolicy,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

/// Which tool a request came through; decides the mandatory fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	/// `search`: filters and sort optional.
	Plain,
	/// `filtered_search`: at least one filter.
	Filtered,
	/// `sorted_search`: at least one sort key.
	Sorted,
}
impl SearchMode {
	/// Tool name exposing this mode.
	pub const fn tool_name(self) -> &'static str {
		match self {
			Self::Plain => "search",
			Self::Filtered => "filtered_search",
			Self::Sorted => "sorted_search",
		}
	}

	/// Checks the mode's mandatory fields.
	pub fn validate(self, request: &SearchRequest) -> Result<(), SearchError> {
		match self {
			Self::Filtered if request.filters().is_empty() => Err(SearchError::MissingRequiredFilter),
			Self::Sorted if request.sort().is_empty() => Err(SearchError::MissingSortSpec),
			_ => Ok(()),
		}
	}
}
impl Display for SearchMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.tool_name())
	}
}

/// Upstream search endpoint plus the identity fields every query carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchEndpoint {
	/// Search endpoint URL.
	pub url: Url,
	/// Client identifier; sent lowercased as `website_id`.
	pub client_id: ClientId,
	/// Client shortcode; sent as `client`.
	pub client_shortcode: ClientShortcode,
}
impl SearchEndpoint {
	/// Validates and bundles the endpoint identity.
	pub fn new(
		url: Url,
		client_id: impl AsRef<str>,
		client_shortcode: impl AsRef<str>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			url,
			client_id: ClientId::new(client_id)?,
			client_shortcode: ClientShortcode::new(client_shortcode)?,
		})
	}

	/// Reuses the identity already validated in `credentials`.
	pub fn from_credentials(url: Url, credentials: &Credentials) -> Self {
		Self {
			url,
			client_id: credentials.client_id.clone(),
			client_shortcode: credentials.client_shortcode.clone(),
		}
	}

	fn query_body(&self, request: &SearchRequest) -> Result<JsonValue, SearchError> {
		let sort_fields = request
			.sort()
			.iter()
			.map(|spec| {
				let mut entry = serde_json::Map::new();

				entry.insert(
					spec.field.clone(),
					serde_json::json!({ "order": spec.order, "type": spec.kind }),
				);

				JsonValue::Object(entry)
			})
			.collect::<Vec<_>>();
		let body = UpstreamQuery {
			q: request.query(),
			website_id: self.client_id.website_id(),
			client: &self.client_shortcode,
			size: request.page_size(),
			start: request.start(),
			scope: request.filters(),
			sort_fields: (!sort_fields.is_empty()).then_some(sort_fields),
		};

		serde_json::to_value(body)
			.map_err(|e| SearchError::InvalidRequest { reason: format!("unserializable query: {e}") })
	}
}

#[cfg(feature = "reqwest")]
/// Search proxy specialized for the crate's default reqwest transport stack.
pub type ReqwestSearchProxy = SearchProxy<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Forwards search requests to the upstream endpoint.
pub struct SearchProxy<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client used for search calls.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors.
	pub transport_mapper: Arc<M>,
	endpoint: SearchEndpoint,
	tokens: Arc<TokenCache>,
	retry: RetryPolicy,
}
impl<C, M> SearchProxy<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a proxy that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		endpoint: SearchEndpoint,
		tokens: Arc<TokenCache>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			endpoint,
			tokens,
			retry: RetryPolicy::default(),
		}
	}

	/// Overrides the retry policy applied to each search.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Upstream endpoint and identity.
	pub fn endpoint(&self) -> &SearchEndpoint {
		&self.endpoint
	}

	/// Token cache shared with other proxies.
	pub fn tokens(&self) -> &Arc<TokenCache> {
		&self.tokens
	}

	/// Validates `request` for `mode` and forwards it upstream.
	///
	/// Validation failures return before any network activity.
	pub async fn search(&self, request: &SearchRequest, mode: SearchMode) -> Result<SearchResponse> {
		const KIND: CallKind = CallKind::Search;

		mode.validate(request)?;

		let body = self.endpoint.query_body(request)?;
		let span = CallSpan::new(KIND, mode.tool_name());

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let started = Instant::now();
		let replayed = AtomicBool::new(false);
		let result = span
			.instrument(self.retry.run(|_| self.attempt(&body, request, &replayed, started)))
			.await;

		match &result {
			Ok(response) => {
				obs::record_call_outcome(KIND, CallOutcome::Success);
				obs::search_completed(
					mode.tool_name(),
					response.results.len(),
					response.pagination.total_results,
					response.execution_time_ms,
				);
			},
			Err(err) => {
				obs::record_call_outcome(KIND, CallOutcome::Failure);
				obs::call_failed(KIND, err);
			},
		}

		result
	}

	async fn attempt(
		&self,
		body: &JsonValue,
		request: &SearchRequest,
		replayed: &AtomicBool,
		started: Instant,
	) -> Result<SearchResponse> {
		loop {
			let token = self.tokens.get_token().await?;
			let response = self.send(&token, body).await?;

			if response.status == 401 && !replayed.swap(true, Ordering::SeqCst) {
				obs::token_rejected();
				self.tokens.invalidate(&token);

				continue;
			}
			if !response.is_success() {
				return Err(SearchError::Upstream {
					status: response.status,
					body: response.body_preview(),
					retry_after: response.retry_after(),
				}
				.into());
			}

			let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

			return Ok(SearchResponse::from_upstream(response.status, &response.body, request, elapsed)?);
		}
	}

	async fn send(&self, token: &AccessToken, body: &JsonValue) -> Result<HttpResponse> {
		let request = HttpRequest::post(self.endpoint.url.clone())
			.with_header("authorization", token.authorization_header())
			.with_header("accept", "application/json")
			.with_json(body)
			.map_err(|e| SearchError::InvalidRequest { reason: format!("unserializable query: {e}") })?;

		self.http_client
			.execute(request)
			.await
			.map_err(|e| self.transport_mapper.map_transport_error(CallTarget::Search, e).into())
	}
}
#[cfg(feature = "reqwest")]
impl SearchProxy<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a proxy backed by the given reqwest transport.
	pub fn new(endpoint: SearchEndpoint, tokens: Arc<TokenCache>, http_client: ReqwestHttpClient) -> Self {
		Self::with_http_client(endpoint, tokens, http_client, Arc::new(ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for SearchProxy<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			endpoint: self.endpoint.clone(),
			tokens: self.tokens.clone(),
			retry: self.retry.clone(),
		}
	}
}
impl<C, M> Debug for SearchProxy<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SearchProxy")
			.field("endpoint", &self.endpoint.url.as_str())
			.field("tokens", &self.tokens)
			.field("retry", &self.retry)
			.finish()
	}
}

#[derive(Serialize)]
struct UpstreamQuery<'a> {
	q: &'a str,
	website_id: String,
	client: &'a str,
	size: u32,
	start: u64,
	scope: &'a BTreeMap<String, FilterCondition>,
	#[serde(skip_serializing_if = "Option::is_none")]
	sort_fields: Option<Vec<JsonValue>>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn endpoint() -> SearchEndpoint {
		SearchEndpoint::new(
			Url::parse("https://search.example.com/v1/search").expect("Fixture URL should parse."),
			"Demo-Store",
			"demo",
		)
		.expect("Fixture endpoint should be valid.")
	}

	#[test]
	fn modes_enforce_mandatory_fields() {
		let bare = SearchRequest::new("shirts");

		assert!(SearchMode::Plain.validate(&bare).is_ok());
		assert!(matches!(
			SearchMode::Filtered.validate(&bare),
			Err(SearchError::MissingRequiredFilter)
		));
		assert!(matches!(SearchMode::Sorted.validate(&bare), Err(SearchError::MissingSortSpec)));

		let sorted = SearchRequest::builder("shirts")
			.sort(SortSpec::new("price", SortOrder::Asc))
			.build()
			.expect("Sorted request should be valid.");

		assert!(SearchMode::Sorted.validate(&sorted).is_ok());
		assert_eq!(SearchMode::Filtered.to_string(), "filtered_search");
	}

	#[test]
	fn query_body_matches_upstream_format() {
		let request = SearchRequest::builder("chocolate milk")
			.page(2)
			.page_size(10)
			.filter_eq("brand", "acme")
			.filter_range("price", Some(json!(1)), Some(json!(5)))
			.sort(SortSpec::new("price", SortOrder::Asc))
			.sort(SortSpec::new("title", SortOrder::Desc).with_kind(SortKind::Text))
			.build()
			.expect("Request should be valid.");
		let body = endpoint().query_body(&request).expect("Body should serialize.");

		assert_eq!(
			body,
			json!({
				"q": "chocolate milk",
				"website_id": "demo-store",
				"client": "demo",
				"size": 10,
				"start": 10,
				"scope": { "brand": "acme", "price": { "min": 1, "max": 5 } },
				"sort_fields": [
					{ "price": { "order": "asc", "type": "number" } },
					{ "title": { "order": "desc", "type": "text" } }
				]
			})
		);
	}

	#[test]
	fn sort_fields_are_omitted_when_empty() {
		let body = endpoint().query_body(&SearchRequest::new("")).expect("Body should serialize.");

		assert!(body.get("sort_fields").is_none());
		assert_eq!(body["scope"], json!({}));
	}
}
