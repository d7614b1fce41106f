mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use common::*;
use search_broker::{
	error::{Error, ErrorReason, SearchError},
	search::{SearchMode, SearchRequest, SortOrder, SortSpec},
};

const TOKEN_BODY: &str = "{\"access_token\":\"search-token\",\"expires_in\":3600}";

fn upstream_page(first: usize, count: usize, total: u64) -> String {
	let results = (first..first + count)
		.map(|rank| json!({ "id": format!("sku-{rank}"), "title": format!("Chocolate Milk {rank}") }))
		.collect::<Vec<_>>();

	json!({
		"payload": {
			"results": results,
			"total_results": total,
			"suggestions": { "fuzzy_suggestions": ["chocolate milk"] }
		}
	})
	.to_string()
}

#[tokio::test]
async fn chocolate_milk_returns_ordered_results_with_pagination() {
	let server = MockServer::start_async().await;
	let auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let search = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/search")
				.header("authorization", "Bearer search-token")
				.header("content-type", "application/json");
			then.status(200)
				.header("content-type", "application/json")
				.body(upstream_page(0, 20, 57));
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(3));
	let response = proxy
		.search(&SearchRequest::new("chocolate milk"), SearchMode::Plain)
		.await
		.expect("Search should succeed.");

	auth.assert_calls_async(1).await;
	search.assert_calls_async(1).await;

	assert_eq!(response.results.len(), 20);
	assert_eq!(response.results[0]["id"], "sku-0");
	assert_eq!(response.results[19]["id"], "sku-19");
	assert_eq!(response.pagination.current_page, 1);
	assert_eq!(response.pagination.total_pages, 3);
	assert_eq!(response.pagination.total_results, 57);
	assert_eq!(response.pagination.page_size, 20);
	assert_eq!(response.suggestions, vec![json!("chocolate milk")]);
	assert_eq!(response.upstream_status, 200);
}

#[tokio::test]
async fn later_pages_report_their_position() {
	let server = MockServer::start_async().await;
	let _auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let _search = server
		.mock_async(|when, then| {
			when.method(POST).path("/search");
			then.status(200)
				.header("content-type", "application/json")
				.body(upstream_page(20, 10, 35));
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(3));
	let request = SearchRequest::builder("chocolate milk")
		.page(3)
		.page_size(10)
		.build()
		.expect("Paged request should be valid.");
	let response = proxy.search(&request, SearchMode::Plain).await.expect("Search should succeed.");

	assert_eq!(response.results.len(), 10);
	assert_eq!(response.results[0]["id"], "sku-20");
	assert_eq!(response.pagination.current_page, 3);
	assert_eq!(response.pagination.total_pages, 4);
}

#[tokio::test]
async fn mode_validation_happens_before_any_network_call() {
	let server = MockServer::start_async().await;
	let auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let search = server
		.mock_async(|when, then| {
			when.method(POST).path("/search");
			then.status(200).header("content-type", "application/json").body(upstream_page(0, 1, 1));
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(3));
	let bare = SearchRequest::new("chocolate milk");
	let filtered = proxy
		.search(&bare, SearchMode::Filtered)
		.await
		.expect_err("filtered_search without filters should be rejected.");
	let sorted = proxy
		.search(&bare, SearchMode::Sorted)
		.await
		.expect_err("sorted_search without sort keys should be rejected.");

	assert!(matches!(filtered, Error::Search(SearchError::MissingRequiredFilter)));
	assert!(matches!(sorted, Error::Search(SearchError::MissingSortSpec)));

	auth.assert_calls_async(0).await;
	search.assert_calls_async(0).await;
}

#[tokio::test]
async fn sorted_search_forwards_upstream_order() {
	let server = MockServer::start_async().await;
	let _auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let body = json!({
		"payload": {
			"results": [{ "id": "cheap", "price": 1.5 }, { "id": "mid", "price": 2.5 }, { "id": "dear", "price": 4 }],
			"total_results": 3
		}
	});
	let _search = server
		.mock_async(|when, then| {
			when.method(POST).path("/search");
			then.status(200).header("content-type", "application/json").body(body.to_string());
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(3));
	let request = SearchRequest::builder("milk")
		.sort(SortSpec::new("price", SortOrder::Asc))
		.build()
		.expect("Sorted request should be valid.");
	let response = proxy.search(&request, SearchMode::Sorted).await.expect("Search should succeed.");
	let ids = response.results.iter().map(|product| product["id"].clone()).collect::<Vec<_>>();

	assert_eq!(ids, vec![json!("cheap"), json!("mid"), json!("dear")]);
	assert_eq!(response.pagination.total_pages, 1);
}

#[tokio::test]
async fn client_errors_from_search_are_not_retried() {
	let server = MockServer::start_async().await;
	let _auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let search = server
		.mock_async(|when, then| {
			when.method(POST).path("/search");
			then.status(400).body("{\"message\":\"unknown field: colour\"}");
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(5));
	let err = proxy
		.search(&SearchRequest::new("milk"), SearchMode::Plain)
		.await
		.expect_err("A 400 should surface.");

	search.assert_calls_async(1).await;

	assert_eq!(err.reason(), ErrorReason::UpstreamError);
	assert_eq!(err.status(), Some(400));
	assert!(err.upstream_body().is_some_and(|body| body.contains("unknown field")));
}

#[tokio::test]
async fn server_errors_from_search_exhaust_the_budget() {
	let server = MockServer::start_async().await;
	let _auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let search = server
		.mock_async(|when, then| {
			when.method(POST).path("/search");
			then.status(502).body("bad gateway");
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(3));
	let err = proxy
		.search(&SearchRequest::new("milk"), SearchMode::Plain)
		.await
		.expect_err("Persistent 502s should surface.");

	search.assert_calls_async(3).await;

	assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
	assert_eq!(err.reason(), ErrorReason::UpstreamError);
	assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn auth_outage_surfaces_from_search_with_its_reason() {
	let server = MockServer::start_async().await;
	let auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).body("down");
		})
		.await;
	let search = server
		.mock_async(|when, then| {
			when.method(POST).path("/search");
			then.status(200).header("content-type", "application/json").body(upstream_page(0, 1, 1));
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(2));
	let err = proxy
		.search(&SearchRequest::new("milk"), SearchMode::Plain)
		.await
		.expect_err("An auth outage should surface from search.");

	auth.assert_calls_async(2).await;
	search.assert_calls_async(0).await;

	assert!(matches!(err, Error::RetryExhausted { .. }));
	assert_eq!(err.reason(), ErrorReason::EndpointUnreachable);
	assert_eq!(err.origin(), "auth");
}

#[tokio::test]
async fn malformed_search_payload_is_reported() {
	let server = MockServer::start_async().await;
	let _auth = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let _search = server
		.mock_async(|when, then| {
			when.method(POST).path("/search");
			then.status(200).header("content-type", "application/json").body("{\"payload\":null}");
		})
		.await;
	let (proxy, _) =
		build_reqwest_test_proxy(&server.url("/token"), &server.url("/search"), fast_retry_policy(3));
	let err = proxy
		.search(&SearchRequest::new("milk"), SearchMode::Plain)
		.await
		.expect_err("A null payload should be rejected.");

	assert_eq!(err.reason(), ErrorReason::MalformedResponse);
	assert_eq!(err.origin(), "search");
}
