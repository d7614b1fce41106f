//! Environment-driven configuration.
//!
//! Values are read through a lookup function so tests can supply a map instead of mutating the
//! process environment. Every missing or malformed value is reported as a [`ConfigError`]
//! naming the variable.

// self
use crate::{_prelude::*, auth::Credentials, error::ConfigError, search::SearchEndpoint};

/// Wire binding used by the binary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transport {
	/// JSON-RPC over HTTP POST at the message path.
	#[default]
	Http,
	/// Line-delimited JSON-RPC over stdin/stdout.
	Stdio,
}
impl FromStr for Transport {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"http" => Ok(Self::Http),
			"stdio" => Ok(Self::Stdio),
			other => Err(ConfigError::InvalidVar {
				name: "MCP_TRANSPORT",
				reason: format!("expected `http` or `stdio`, got `{other}`"),
			}),
		}
	}
}

/// Runtime configuration for the proxy and its server binding.
#[derive(Clone, Debug)]
pub struct Config {
	/// Client identity and auth endpoint.
	pub credentials: Credentials,
	/// Search endpoint URL.
	pub search_endpoint: Url,
	/// Interface the HTTP transport binds to.
	pub host: String,
	/// Port the HTTP transport binds to.
	pub port: u16,
	/// Path accepting JSON-RPC POSTs.
	pub message_path: String,
	/// Selected transport.
	pub transport: Transport,
	/// Safety margin before token expiry.
	pub token_refresh_margin: Duration,
	/// Attempt budget for auth and search calls.
	pub retry_max_attempts: u32,
	/// Per-request HTTP timeout.
	pub http_timeout: Duration,
}
impl Config {
	const DEFAULT_HOST: &'static str = "0.0.0.0";
	const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
	const DEFAULT_MESSAGE_PATH: &'static str = "/mcp/messages/";
	const DEFAULT_PORT: u16 = 3000;
	const DEFAULT_REFRESH_MARGIN_SECS: u64 = 30;
	const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 4;

	/// Reads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads configuration through `lookup`; empty values count as absent.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());
		let required = |name: &'static str| get(name).ok_or(ConfigError::MissingVar { name });
		let url = |name: &'static str| {
			required(name).and_then(|raw| {
				Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { name, source })
			})
		};
		let auth_endpoint = url("AUTH_ENDPOINT")?;
		let search_endpoint = url("SEARCH_API_ENDPOINT")?;
		let credentials = Credentials::new(
			required("CLIENT_ID")?.trim(),
			required("CLIENT_SHORTCODE")?.trim(),
			required("CLIENT_SECRET")?,
			auth_endpoint,
		)?;
		let message_path = get("MESSAGE_PATH").unwrap_or_else(|| Self::DEFAULT_MESSAGE_PATH.into());

		if !message_path.starts_with('/') {
			return Err(ConfigError::InvalidVar {
				name: "MESSAGE_PATH",
				reason: "must start with `/`".into(),
			});
		}

		let retry_max_attempts = parse_or(
			"RETRY_MAX_ATTEMPTS",
			get("RETRY_MAX_ATTEMPTS"),
			Self::DEFAULT_RETRY_MAX_ATTEMPTS,
		)?;

		if retry_max_attempts == 0 {
			return Err(ConfigError::InvalidVar {
				name: "RETRY_MAX_ATTEMPTS",
				reason: "must be at least 1".into(),
			});
		}

		let timeout_secs =
			parse_or("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), Self::DEFAULT_HTTP_TIMEOUT_SECS)?;

		if timeout_secs == 0 {
			return Err(ConfigError::InvalidVar {
				name: "HTTP_TIMEOUT_SECS",
				reason: "must be at least 1".into(),
			});
		}

		let margin_secs = parse_or(
			"TOKEN_REFRESH_MARGIN_SECS",
			get("TOKEN_REFRESH_MARGIN_SECS"),
			Self::DEFAULT_REFRESH_MARGIN_SECS,
		)?;

		Ok(Self {
			credentials,
			search_endpoint,
			host: get("HOST").unwrap_or_else(|| Self::DEFAULT_HOST.into()),
			port: parse_or("PORT", get("PORT"), Self::DEFAULT_PORT)?,
			message_path,
			transport: get("MCP_TRANSPORT").map(|raw| raw.parse()).transpose()?.unwrap_or_default(),
			token_refresh_margin: seconds(margin_secs),
			retry_max_attempts,
			http_timeout: seconds(timeout_secs),
		})
	}

	/// Search endpoint bound to the configured identity.
	pub fn search_endpoint(&self) -> SearchEndpoint {
		SearchEndpoint::from_credentials(self.search_endpoint.clone(), &self.credentials)
	}

	/// `host:port` string for the HTTP listener.
	pub fn bind_address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	match raw {
		None => Ok(default),
		Some(raw) => raw
			.trim()
			.parse()
			.map_err(|e: T::Err| ConfigError::InvalidVar { name, reason: e.to_string() }),
	}
}

fn seconds(secs: u64) -> Duration {
	Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
