// std
use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use serde_json::{Value as JsonValue, json};
use time::{Duration, OffsetDateTime};
// self
use search_broker::{
	auth::{AccessToken, TokenCache, TokenFuture, TokenSource},
	error::{Error, ErrorReason, TransportError},
	http::{CallTarget, HttpFuture, HttpRequest, HttpResponse, ProxyHttpClient, TransportErrorMapper},
	retry::RetryPolicy,
	search::{
		FilterSpec, SearchEndpoint, SearchMode, SearchProxy, SearchRequest, SortKind, SortOrder,
		SortSpec,
	},
	url::Url,
};

/// Hands out `token-1`, `token-2`, ... one per exchange.
#[derive(Default)]
struct CountingSource {
	issued: AtomicUsize,
}
impl TokenSource for CountingSource {
	fn fetch_token(&self) -> TokenFuture<'_> {
		let serial = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

		Box::pin(async move {
			Ok(AccessToken::new(
				format!("token-{serial}"),
				None,
				OffsetDateTime::now_utc(),
				Duration::hours(1),
			))
		})
	}
}

/// Replays scripted statuses; answers 200 with the last page once the script runs dry.
struct ScriptedUpstream {
	script: Mutex<VecDeque<u16>>,
	requests: Mutex<Vec<HttpRequest>>,
}
impl ScriptedUpstream {
	fn new(script: impl IntoIterator<Item = u16>) -> Arc<Self> {
		Arc::new(Self {
			script: Mutex::new(script.into_iter().collect()),
			requests: Mutex::new(Vec::new()),
		})
	}

	fn calls(&self) -> usize {
		self.requests.lock().expect("Request log should not be poisoned.").len()
	}

	fn request(&self, index: usize) -> HttpRequest {
		self.requests.lock().expect("Request log should not be poisoned.")[index].clone()
	}
}
impl ProxyHttpClient for ScriptedUpstream {
	type TransportError = std::io::Error;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		self.requests.lock().expect("Request log should not be poisoned.").push(request);

		let status =
			self.script.lock().expect("Script should not be poisoned.").pop_front().unwrap_or(200);

		Box::pin(async move {
			let body = if status == 200 {
				json!({ "payload": { "results": [{ "id": "sku-1" }], "total_results": 1 } })
			} else {
				json!({ "message": format!("status {status}") })
			};

			Ok(HttpResponse::new(status, body.to_string()))
		})
	}
}

struct NetworkMapper;
impl TransportErrorMapper<std::io::Error> for NetworkMapper {
	fn map_transport_error(&self, _: CallTarget, error: std::io::Error) -> TransportError {
		TransportError::network(error)
	}
}

fn proxy(
	upstream: &Arc<ScriptedUpstream>,
	max_attempts: u32,
) -> (SearchProxy<ScriptedUpstream, NetworkMapper>, Arc<CountingSource>) {
	let source = Arc::new(CountingSource::default());
	let tokens = Arc::new(TokenCache::new(source.clone()));
	let endpoint = SearchEndpoint::new(
		Url::parse("https://search.example.com/v1/search").expect("Fixture URL should parse."),
		"Demo-Store",
		"demo",
	)
	.expect("Fixture endpoint should be valid.");
	let proxy = <SearchProxy<ScriptedUpstream, NetworkMapper>>::with_http_client(
		endpoint,
		tokens,
		upstream.clone(),
		Arc::new(NetworkMapper),
	)
	.with_retry_policy(RetryPolicy::new().with_max_attempts(max_attempts));

	(proxy, source)
}

fn body_of(request: &HttpRequest) -> JsonValue {
	serde_json::from_slice(&request.body).expect("Search body should be JSON.")
}

#[tokio::test(start_paused = true)]
async fn five_unavailable_responses_then_success_within_six_attempts() {
	let upstream = ScriptedUpstream::new([503, 503, 503, 503, 503]);
	let (proxy, source) = proxy(&upstream, 6);
	let response = proxy
		.search(&SearchRequest::new("chocolate milk"), SearchMode::Plain)
		.await
		.expect("The sixth attempt should succeed.");

	assert_eq!(upstream.calls(), 6);
	assert_eq!(response.results, vec![json!({ "id": "sku-1" })]);
	assert_eq!(source.issued.load(Ordering::SeqCst), 1);

	let first = body_of(&upstream.request(0));

	for index in 1..6 {
		assert_eq!(body_of(&upstream.request(index)), first);
	}
}

#[tokio::test(start_paused = true)]
async fn unavailable_past_the_budget_reports_the_last_status() {
	let upstream = ScriptedUpstream::new([503, 503, 429]);
	let (proxy, _) = proxy(&upstream, 3);
	let err = proxy
		.search(&SearchRequest::new("milk"), SearchMode::Plain)
		.await
		.expect_err("The budget should run out.");

	assert_eq!(upstream.calls(), 3);
	assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
	assert_eq!(err.status(), Some(429));
	assert_eq!(err.reason(), ErrorReason::UpstreamError);
}

#[tokio::test(start_paused = true)]
async fn rejected_token_is_replaced_and_the_request_replayed_once() {
	let upstream = ScriptedUpstream::new([401]);
	let (proxy, source) = proxy(&upstream, 1);

	proxy
		.search(&SearchRequest::new("milk"), SearchMode::Plain)
		.await
		.expect("Replay with a fresh token should succeed.");

	assert_eq!(upstream.calls(), 2);
	assert_eq!(source.issued.load(Ordering::SeqCst), 2);
	assert_eq!(upstream.request(0).header("authorization"), Some("Bearer token-1"));
	assert_eq!(upstream.request(1).header("authorization"), Some("Bearer token-2"));
}

#[tokio::test(start_paused = true)]
async fn second_rejection_is_not_replayed() {
	let upstream = ScriptedUpstream::new([401, 401]);
	let (proxy, source) = proxy(&upstream, 4);
	let err = proxy
		.search(&SearchRequest::new("milk"), SearchMode::Plain)
		.await
		.expect_err("A second 401 should surface.");

	assert_eq!(upstream.calls(), 2);
	assert_eq!(source.issued.load(Ordering::SeqCst), 2);
	assert_eq!(err.status(), Some(401));
	assert_eq!(err.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn upstream_receives_query_identity_filters_and_sort() {
	let upstream = ScriptedUpstream::new([200]);
	let (proxy, _) = proxy(&upstream, 1);
	let request = SearchRequest::builder("chocolate milk")
		.page(2)
		.page_size(20)
		.filter(FilterSpec::eq("brand", "Acme"))
		.sort(SortSpec::new("price", SortOrder::Asc).with_kind(SortKind::Number))
		.build()
		.expect("Request should be valid.");

	proxy.search(&request, SearchMode::Sorted).await.expect("Search should succeed.");

	let sent = upstream.request(0);

	assert_eq!(sent.header("content-type"), Some("application/json"));
	assert_eq!(
		body_of(&sent),
		json!({
			"q": "chocolate milk",
			"website_id": "demo-store",
			"client": "demo",
			"size": 20,
			"start": 20,
			"scope": { "brand": "Acme" },
			"sort_fields": [{ "price": { "order": "asc", "type": "number" } }]
		})
	);
}
