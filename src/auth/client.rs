//! Client-credentials exchange against the auth endpoint.
//!
//! [`AuthClient::fetch_token`] performs exactly one form-encoded POST and classifies the
//! outcome: transport failures, 5xx, 429 and OAuth `temporarily_unavailable`/`server_error`
//! replies are transient [`AuthError::EndpointUnreachable`]; any other 4xx is a terminal
//! [`AuthError::InvalidCredentials`]; a 2xx that does not carry a usable token is
//! [`AuthError::MalformedResponse`]. Retrying is the caller's business (see
//! [`crate::auth::TokenCache`]).

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials},
	error::{AuthError, ConfigError, TransportError, is_transient_status},
	http::{CallTarget, HttpRequest, HttpResponse, ProxyHttpClient, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

/// Boxed future returned by [`TokenSource::fetch_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Anything able to mint a fresh access token with a single exchange.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Performs one exchange; never retries.
	fn fetch_token(&self) -> TokenFuture<'_>;
}

#[cfg(feature = "reqwest")]
/// Auth client specialized for the crate's default reqwest transport stack.
pub type ReqwestAuthClient = AuthClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Performs the client-credentials exchange over a [`ProxyHttpClient`].
pub struct AuthClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client used for the exchange.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors.
	pub transport_mapper: Arc<M>,
}
impl<C, M> AuthClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	const DEFAULT_EXPIRES_IN: i64 = 3600;

	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), transport_mapper: mapper.into() }
	}

	/// Exchanges `credentials` for a new access token.
	pub async fn fetch_token(&self, credentials: &Credentials) -> Result<AccessToken> {
		let request = HttpRequest::post(credentials.auth_endpoint.clone())
			.with_header("accept", "application/json")
			.with_form([
				("grant_type", "client_credentials"),
				("client_id", credentials.client_id.as_ref()),
				("client_secret", credentials.client_secret.expose()),
				("client_shortcode", credentials.client_shortcode.as_ref()),
			]);
		let issued_at = OffsetDateTime::now_utc();
		let response = self.http_client.execute(request).await.map_err(|err| {
			match self.transport_mapper.map_transport_error(CallTarget::Auth, err) {
				err @ TransportError::Request { .. } => Error::from(ConfigError::HttpRequest(err)),
				err => AuthError::EndpointUnreachable {
					status: None,
					retry_after: None,
					message: err.to_string(),
				}
				.into(),
			}
		})?;

		Ok(Self::parse_token(&response, issued_at)?)
	}

	fn parse_token(
		response: &HttpResponse,
		issued_at: OffsetDateTime,
	) -> Result<AccessToken, AuthError> {
		let status = response.status;

		if !response.is_success() {
			return Err(classify_failure(response));
		}

		let mut de = serde_json::Deserializer::from_slice(&response.body);
		let body: TokenResponse = serde_path_to_error::deserialize(&mut de).map_err(|err| {
			AuthError::MalformedResponse { status, message: format!("{} at {}", err.inner(), err.path()) }
		})?;
		let value = body.access_token.filter(|token| !token.trim().is_empty()).ok_or_else(|| {
			AuthError::MalformedResponse { status, message: "Token response carries no access token.".into() }
		})?;
		let expires_in = match body.expires_in {
			None => Self::DEFAULT_EXPIRES_IN,
			Some(raw) => raw.seconds().ok_or_else(|| AuthError::MalformedResponse {
				status,
				message: "Token response carries an unreadable `expires_in`.".into(),
			})?,
		};

		if expires_in <= 0 {
			return Err(AuthError::MalformedResponse {
				status,
				message: format!("Token response carries a non-positive `expires_in` ({expires_in})."),
			});
		}

		Ok(AccessToken::new(value, body.token_type, issued_at, Duration::seconds(expires_in)))
	}
}
#[cfg(feature = "reqwest")]
impl AuthClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by the given reqwest transport.
	pub fn new(http_client: ReqwestHttpClient) -> Self {
		Self::with_http_client(http_client, Arc::new(ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for AuthClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { http_client: self.http_client.clone(), transport_mapper: self.transport_mapper.clone() }
	}
}
impl<C, M> Debug for AuthClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AuthClient(..)")
	}
}

/// Binds [`Credentials`] to an [`AuthClient`] so the pair can feed a token cache.
pub struct CredentialStore<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	credentials: Credentials,
	client: AuthClient<C, M>,
}
impl<C, M> CredentialStore<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Pairs the client identity with the client performing the exchange.
	pub fn new(credentials: Credentials, client: AuthClient<C, M>) -> Self {
		Self { credentials, client }
	}

	/// Client identity used for every exchange.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}
}
impl<C, M> TokenSource for CredentialStore<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fetch_token(&self) -> TokenFuture<'_> {
		Box::pin(self.client.fetch_token(&self.credentials))
	}
}
impl<C, M> Debug for CredentialStore<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore").field("credentials", &self.credentials).finish()
	}
}

#[derive(Deserialize)]
struct TokenResponse {
	#[serde(default, alias = "token")]
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresIn>,
	#[serde(default)]
	token_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Integer(i64),
	Float(f64),
	Text(String),
}
impl ExpiresIn {
	fn seconds(&self) -> Option<i64> {
		match self {
			Self::Integer(value) => Some(*value),
			Self::Float(value) if value.is_finite() => Some(value.trunc() as i64),
			Self::Float(_) => None,
			Self::Text(value) => value.trim().parse().ok(),
		}
	}
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
}

fn classify_failure(response: &HttpResponse) -> AuthError {
	let status = response.status;
	let oauth_code = serde_json::from_slice::<OAuthErrorBody>(&response.body).ok().map(|b| b.error);
	let transient_code =
		matches!(oauth_code.as_deref(), Some("temporarily_unavailable" | "server_error"));

	if is_transient_status(status) || transient_code {
		return AuthError::EndpointUnreachable {
			status: Some(status),
			retry_after: response.retry_after(),
			message: match oauth_code {
				Some(code) => format!("HTTP {status} ({code})"),
				None => format!("HTTP {status}"),
			},
		};
	}

	AuthError::InvalidCredentials { status, body: response.body_preview() }
}
