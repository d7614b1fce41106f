//! Proxy-level error types shared across the auth, retry, and search layers.
//!
//! Every error is `Clone` so a coalesced token refresh can hand the same failure to each
//! waiter, and every error exposes a machine-readable [`ErrorReason`] so tool callers never
//! receive an opaque "unknown error".

// self
use crate::{_prelude::*, retry::RetryDecision};

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical proxy error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential exchange failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Search request or upstream search failure.
	#[error(transparent)]
	Search(#[from] SearchError),
	/// The retry budget ran out; `last` is the final failure observed.
	#[error("Gave up after attempt {attempts}: {last}")]
	RetryExhausted {
		/// Number of attempts performed, including the first one.
		attempts: u32,
		/// Last failure observed before giving up.
		#[source]
		last: Box<Error>,
	},
}
impl Error {
	/// Machine-readable reason; [`Error::RetryExhausted`] reports the reason of its last failure.
	pub fn reason(&self) -> ErrorReason {
		match self {
			Self::Config(_) => ErrorReason::Configuration,
			Self::Auth(err) => err.reason(),
			Self::Search(err) => err.reason(),
			Self::RetryExhausted { last, .. } => last.reason(),
		}
	}

	/// Layer that produced the failure (`config`, `auth` or `search`).
	pub fn origin(&self) -> &'static str {
		match self {
			Self::Config(_) => "config",
			Self::Auth(_) => "auth",
			Self::Search(_) => "search",
			Self::RetryExhausted { last, .. } => last.origin(),
		}
	}

	/// Upstream HTTP status, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Config(_) => None,
			Self::Auth(err) => err.status(),
			Self::Search(err) => err.status(),
			Self::RetryExhausted { last, .. } => last.status(),
		}
	}

	/// Upstream response body preview, when one was received.
	pub fn upstream_body(&self) -> Option<&str> {
		match self {
			Self::Auth(AuthError::InvalidCredentials { body, .. })
			| Self::Search(SearchError::Upstream { body, .. }) => Some(body),
			Self::RetryExhausted { last, .. } => last.upstream_body(),
			_ => None,
		}
	}

	/// Attempts spent before the error surfaced (1 unless the retry budget was exhausted).
	pub fn attempts(&self) -> u32 {
		match self {
			Self::RetryExhausted { attempts, .. } => *attempts,
			_ => 1,
		}
	}

	/// Returns the credential failure behind this error, looking through retry exhaustion.
	pub fn as_auth(&self) -> Option<&AuthError> {
		match self {
			Self::Auth(err) => Some(err),
			Self::RetryExhausted { last, .. } => last.as_auth(),
			_ => None,
		}
	}

	/// Returns the search failure behind this error, looking through retry exhaustion.
	pub fn as_search(&self) -> Option<&SearchError> {
		match self {
			Self::Search(err) => Some(err),
			Self::RetryExhausted { last, .. } => last.as_search(),
			_ => None,
		}
	}

	/// Classifies the failure for the retry policy.
	pub fn retry_decision(&self) -> RetryDecision {
		match self {
			Self::Config(_) => RetryDecision::Stop,
			Self::Auth(err) => err.retry_decision(),
			Self::Search(err) => err.retry_decision(),
			Self::RetryExhausted { .. } => RetryDecision::Stop,
		}
	}
}
impl From<TransportError> for Error {
	fn from(e: TransportError) -> Self {
		match e {
			TransportError::Request { .. } => ConfigError::HttpRequest(e).into(),
			e => SearchError::NetworkFailure(e).into(),
		}
	}
}

/// Stable, serializable failure codes surfaced to tool callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
	/// Local configuration is missing or invalid.
	Configuration,
	/// Auth endpoint rejected the client identity.
	InvalidCredentials,
	/// Auth endpoint could not be reached or is temporarily failing.
	EndpointUnreachable,
	/// An upstream endpoint answered with a body that could not be interpreted.
	MalformedResponse,
	/// `filtered_search` was called without filters.
	MissingRequiredFilter,
	/// `sorted_search` was called without a sort specification.
	MissingSortSpec,
	/// Request fields failed local validation.
	InvalidRequest,
	/// Search endpoint answered with a non-2xx status.
	UpstreamError,
	/// Search endpoint could not be reached.
	NetworkFailure,
}
impl ErrorReason {
	/// Returns a stable label suitable for payloads, spans, or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Configuration => "configuration",
			Self::InvalidCredentials => "invalid_credentials",
			Self::EndpointUnreachable => "endpoint_unreachable",
			Self::MalformedResponse => "malformed_response",
			Self::MissingRequiredFilter => "missing_required_filter",
			Self::MissingSortSpec => "missing_sort_spec",
			Self::InvalidRequest => "invalid_request",
			Self::UpstreamError => "upstream_error",
			Self::NetworkFailure => "network_failure",
		}
	}
}
impl Display for ErrorReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised at startup or while building requests.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Required environment variable is absent or empty.
	#[error("Required setting `{name}` is missing.")]
	MissingVar {
		/// Variable name.
		name: &'static str,
	},
	/// Environment variable holds a value that cannot be used.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidVar {
		/// Variable name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Endpoint URL cannot be parsed.
	#[error("Setting `{name}` is not a valid URL.")]
	InvalidUrl {
		/// Variable name.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request could not be assembled by the transport.
	#[error("HTTP request could not be built.")]
	HttpRequest(#[source] TransportError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Credential exchange failures.
#[derive(Clone, Debug, ThisError)]
pub enum AuthError {
	/// Auth endpoint rejected the client identity (4xx other than 429).
	#[error("Auth endpoint rejected the client credentials with HTTP {status}.")]
	InvalidCredentials {
		/// HTTP status returned by the auth endpoint.
		status: u16,
		/// Truncated response body for diagnosis.
		body: String,
	},
	/// Auth endpoint is unreachable or temporarily failing (network, 5xx, 429).
	#[error("Auth endpoint is unreachable: {message}")]
	EndpointUnreachable {
		/// HTTP status, when the endpoint answered at all.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Human-readable failure summary.
		message: String,
	},
	/// Auth endpoint answered 2xx with a payload that is not a usable token.
	#[error("Auth endpoint returned a malformed response: {message}")]
	MalformedResponse {
		/// HTTP status returned by the auth endpoint.
		status: u16,
		/// Parser diagnostics.
		message: String,
	},
}
impl AuthError {
	/// Machine-readable reason.
	pub fn reason(&self) -> ErrorReason {
		match self {
			Self::InvalidCredentials { .. } => ErrorReason::InvalidCredentials,
			Self::EndpointUnreachable { .. } => ErrorReason::EndpointUnreachable,
			Self::MalformedResponse { .. } => ErrorReason::MalformedResponse,
		}
	}

	/// HTTP status, when the endpoint answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::InvalidCredentials { status, .. } | Self::MalformedResponse { status, .. } =>
				Some(*status),
			Self::EndpointUnreachable { status, .. } => *status,
		}
	}

	fn retry_decision(&self) -> RetryDecision {
		match self {
			Self::EndpointUnreachable { retry_after, .. } =>
				RetryDecision::Retry { retry_after: *retry_after },
			Self::InvalidCredentials { .. } | Self::MalformedResponse { .. } => RetryDecision::Stop,
		}
	}
}

/// Search request and upstream search failures.
#[derive(Clone, Debug, ThisError)]
pub enum SearchError {
	/// `filtered_search` requires at least one filter.
	#[error("The filtered search requires at least one filter.")]
	MissingRequiredFilter,
	/// `sorted_search` requires at least one sort field.
	#[error("The sorted search requires at least one sort field.")]
	MissingSortSpec,
	/// Request fields failed local validation.
	#[error("Search request is invalid: {reason}.")]
	InvalidRequest {
		/// Why the request was rejected.
		reason: String,
	},
	/// Search endpoint answered with a non-2xx status.
	#[error("Search endpoint returned HTTP {status}.")]
	Upstream {
		/// HTTP status returned by the search endpoint.
		status: u16,
		/// Truncated response body for diagnosis.
		body: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Search endpoint could not be reached.
	#[error("Search endpoint could not be reached: {0}")]
	NetworkFailure(#[source] TransportError),
	/// Search endpoint answered 2xx with a body that could not be interpreted.
	#[error("Search endpoint returned a malformed response: {message}")]
	MalformedResponse {
		/// HTTP status returned by the search endpoint.
		status: u16,
		/// Parser diagnostics.
		message: String,
	},
}
impl SearchError {
	/// Machine-readable reason.
	pub fn reason(&self) -> ErrorReason {
		match self {
			Self::MissingRequiredFilter => ErrorReason::MissingRequiredFilter,
			Self::MissingSortSpec => ErrorReason::MissingSortSpec,
			Self::InvalidRequest { .. } => ErrorReason::InvalidRequest,
			Self::Upstream { .. } => ErrorReason::UpstreamError,
			Self::NetworkFailure(_) => ErrorReason::NetworkFailure,
			Self::MalformedResponse { .. } => ErrorReason::MalformedResponse,
		}
	}

	/// HTTP status, when the endpoint answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Upstream { status, .. } | Self::MalformedResponse { status, .. } => Some(*status),
			_ => None,
		}
	}

	fn retry_decision(&self) -> RetryDecision {
		match self {
			Self::Upstream { status, retry_after, .. } if is_transient_status(*status) =>
				RetryDecision::Retry { retry_after: *retry_after },
			Self::NetworkFailure(_) => RetryDecision::Retry { retry_after: None },
			_ => RetryDecision::Stop,
		}
	}
}

/// Transport-level failures (network, IO) reported by a [`crate::http::ProxyHttpClient`].
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// The request or response exceeded the transport timeout.
	#[error("Request timed out: {source}")]
	Timeout {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// The connection could not be established.
	#[error("Connection failed: {source}")]
	Connect {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// The connection broke mid-flight (reset, truncated body, protocol error).
	#[error("Network error: {source}")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// The request could not be assembled; retrying cannot help.
	#[error("Request could not be built: {source}")]
	Request {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
}
impl TransportError {
	/// Wraps a timeout failure.
	pub fn timeout(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Timeout { source: Arc::new(src) }
	}

	/// Wraps a connection failure.
	pub fn connect(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Connect { source: Arc::new(src) }
	}

	/// Wraps a generic network failure.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// Wraps a request construction failure.
	pub fn request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Request { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::network(e)
	}
}

/// 5xx and 429 are worth another attempt; every other status is final.
pub(crate) fn is_transient_status(status: u16) -> bool {
	status == 429 || (500..=599).contains(&status)
}
