//! Client identity used for the credential exchange and the search payload.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ClientShortcode, Secret},
	error::ConfigError,
};

/// Client identity issued by the search vendor. Loaded once at startup and never mutated.
#[derive(Clone)]
pub struct Credentials {
	/// Client identifier.
	pub client_id: ClientId,
	/// Client shortcode.
	pub client_shortcode: ClientShortcode,
	/// Client secret; never logged.
	pub client_secret: Secret,
	/// Credential exchange endpoint.
	pub auth_endpoint: Url,
}
impl Credentials {
	/// Validates and bundles the client identity.
	pub fn new(
		client_id: impl AsRef<str>,
		client_shortcode: impl AsRef<str>,
		client_secret: impl Into<String>,
		auth_endpoint: Url,
	) -> Result<Self, ConfigError> {
		let client_secret = Secret::new(client_secret);

		if client_secret.is_empty() {
			return Err(ConfigError::MissingVar { name: "CLIENT_SECRET" });
		}

		Ok(Self {
			client_id: ClientId::new(client_id)?,
			client_shortcode: ClientShortcode::new(client_shortcode)?,
			client_secret,
			auth_endpoint,
		})
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("client_shortcode", &self.client_shortcode)
			.field("client_secret", &self.client_secret)
			.field("auth_endpoint", &self.auth_endpoint.as_str())
			.finish()
	}
}
