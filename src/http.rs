//! Transport primitives for auth and search calls.
//!
//! [`ProxyHttpClient`] is the proxy's only dependency on an HTTP stack. Requests and responses
//! travel as crate-owned [`HttpRequest`]/[`HttpResponse`] values so retry classification, token
//! parsing, and search mapping never touch reqwest types, and tests can script upstream
//! behavior with plain fakes. Transport failures pass through a [`TransportErrorMapper`] that
//! sorts them into timeout/connect/network/request buckets for the retry policy.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderName, HeaderValue};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`ProxyHttpClient::execute`].
pub type HttpFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports able to execute auth and search calls.
///
/// Implementations must return `Ok` for every response the server produced, whatever its
/// status; only failures to obtain a response (DNS, TCP, TLS, timeouts) are errors.
pub trait ProxyHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request` and collects the full response.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// Maps transport-specific failures into the proxy's [`TransportError`] buckets.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts a transport failure observed while calling `target`.
	fn map_transport_error(&self, target: CallTarget, error: E) -> TransportError;
}

/// Upstream endpoint a request is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallTarget {
	/// Credential exchange endpoint.
	Auth,
	/// Product search endpoint.
	Search,
}
impl CallTarget {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Auth => "auth",
			Self::Search => "search",
		}
	}
}
impl Display for CallTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// HTTP methods the proxy issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// `POST`.
	Post,
}
impl HttpMethod {
	/// Returns the canonical method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Post => "POST",
		}
	}
}

/// Outbound request described without reference to any HTTP client.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
	/// Request method.
	pub method: HttpMethod,
	/// Absolute target URL.
	pub url: Url,
	/// Header pairs in insertion order; names are lowercase.
	pub headers: Vec<(String, String)>,
	/// Encoded request body.
	pub body: Vec<u8>,
}
impl HttpRequest {
	/// Creates a `POST` request with an empty body.
	pub fn post(url: Url) -> Self {
		Self { method: HttpMethod::Post, url, headers: Vec::new(), body: Vec::new() }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into().to_ascii_lowercase(), value.into()));

		self
	}

	/// Sets a JSON body and the matching content type.
	pub fn with_json(self, body: &impl Serialize) -> Result<Self, serde_json::Error> {
		let bytes = serde_json::to_vec(body)?;

		Ok(Self { body: bytes, ..self.with_header("content-type", "application/json") })
	}

	/// Sets an `application/x-www-form-urlencoded` body from ordered pairs.
	pub fn with_form<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();

		Self {
			body: body.into_bytes(),
			..self.with_header("content-type", "application/x-www-form-urlencoded")
		}
	}

	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}
}
impl Debug for HttpRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// Bodies and authorization headers carry secrets.
		f.debug_struct("HttpRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &self.headers.iter().map(|(name, _)| name).collect::<Vec<_>>())
			.field("body_len", &self.body.len())
			.finish()
	}
}

/// Response collected by a [`ProxyHttpClient`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header pairs; names are lowercase.
	pub headers: Vec<(String, String)>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	const BODY_PREVIEW_LIMIT: usize = 512;

	/// Creates a response with the given status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: Vec::new(), body: body.into() }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into().to_ascii_lowercase(), value.into()));

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}

	/// Parses the `Retry-After` header (delta-seconds or HTTP date).
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(self.header("retry-after")?, OffsetDateTime::now_utc())
	}

	/// Lossy UTF-8 body truncated for error payloads and logs.
	pub fn body_preview(&self) -> String {
		truncate_preview(String::from_utf8_lossy(&self.body).into_owned())
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Configure any custom [`ReqwestClient`] with a request timeout; the proxy relies on the
/// transport to bound each attempt.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose attempts time out after `timeout`.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.connect_timeout(timeout.min(std::time::Duration::from_secs(10)))
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	fn build_request(&self, request: HttpRequest) -> Result<reqwest::Request, ReqwestError> {
		let method = match request.method {
			HttpMethod::Post => reqwest::Method::POST,
		};
		let mut builder = self.0.request(method, request.url);

		for (name, value) in request.headers {
			builder = builder.header(name, value);
		}

		builder.body(request.body).build()
	}
}
#[cfg(feature = "reqwest")]
impl ProxyHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		Box::pin(async move {
			let request = self.build_request(request)?;
			let response = self.0.execute(request).await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value): (&HeaderName, &HeaderValue)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok(HttpResponse { status, headers, body })
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, target: CallTarget, err: ReqwestError) -> TransportError {
		// The auth endpoint URL is part of the client identity.
		let err = match target {
			CallTarget::Auth => err.without_url(),
			CallTarget::Search => err,
		};

		if err.is_builder() {
			TransportError::request(err)
		} else if err.is_timeout() {
			TransportError::timeout(err)
		} else if err.is_connect() {
			TransportError::connect(err)
		} else {
			TransportError::network(err)
		}
	}
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
	headers
		.iter()
		.find(|(key, _)| key.eq_ignore_ascii_case(name))
		.map(|(_, value)| value.as_str())
}

fn parse_retry_after(raw: &str, now: OffsetDateTime) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= HttpResponse::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= HttpResponse::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}
