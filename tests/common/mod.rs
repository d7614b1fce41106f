//! Fixtures shared by the integration suites.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use search_broker::{
	auth::{CredentialStore, Credentials, ReqwestAuthClient, TokenCache},
	http::ReqwestHttpClient,
	retry::RetryPolicy,
	search::{ReqwestSearchProxy, SearchEndpoint},
	url::Url,
};
use time::Duration;

pub const CLIENT_ID: &str = "Demo-Store";
pub const CLIENT_SHORTCODE: &str = "demo";
pub const CLIENT_SECRET: &str = "demo-secret";

/// Retry policy with millisecond delays so exhaustion tests stay fast against real sockets.
pub fn fast_retry_policy(max_attempts: u32) -> RetryPolicy {
	RetryPolicy::new()
		.with_max_attempts(max_attempts)
		.with_initial_delay(Duration::milliseconds(1))
		.with_max_delay(Duration::milliseconds(5))
		.with_max_retry_after(Duration::milliseconds(5))
		.with_jitter(false)
}

pub fn parse_url(raw: &str) -> Url {
	Url::parse(raw).expect("Mock server URL should parse.")
}

pub fn test_credentials(auth_url: &str) -> Credentials {
	Credentials::new(CLIENT_ID, CLIENT_SHORTCODE, CLIENT_SECRET, parse_url(auth_url))
		.expect("Test credentials should be valid.")
}

pub fn build_reqwest_token_cache(auth_url: &str, retry: RetryPolicy) -> Arc<TokenCache> {
	let client = ReqwestAuthClient::new(ReqwestHttpClient::default());
	let store = CredentialStore::new(test_credentials(auth_url), client);

	Arc::new(TokenCache::new(Arc::new(store)).with_retry_policy(retry))
}

pub fn build_reqwest_test_proxy(
	auth_url: &str,
	search_url: &str,
	retry: RetryPolicy,
) -> (ReqwestSearchProxy, Arc<TokenCache>) {
	let tokens = build_reqwest_token_cache(auth_url, retry.clone());
	let endpoint = SearchEndpoint::new(parse_url(search_url), CLIENT_ID, CLIENT_SHORTCODE)
		.expect("Search endpoint should be valid.");
	let proxy = ReqwestSearchProxy::new(endpoint, tokens.clone(), ReqwestHttpClient::default())
		.with_retry_policy(retry);

	(proxy, tokens)
}
