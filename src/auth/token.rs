//! Short-lived bearer credential issued by the auth endpoint.

pub mod secret;

// self
use crate::{_prelude::*, auth::Secret};

/// Bearer token plus the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
	/// Token value; never logged.
	pub value: Secret,
	/// Token type reported by the auth endpoint (`Bearer` when absent).
	pub token_type: String,
	/// Instant the token was issued.
	pub issued_at: OffsetDateTime,
	/// Instant the token expires.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Token type used when the auth endpoint omits one.
	pub const DEFAULT_TOKEN_TYPE: &'static str = "Bearer";

	/// Creates a token issued at `issued_at` that lives for `expires_in`.
	pub fn new(
		value: impl Into<String>,
		token_type: Option<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Self {
		Self {
			value: Secret::new(value),
			token_type: token_type
				.filter(|kind| !kind.trim().is_empty())
				.unwrap_or_else(|| Self::DEFAULT_TOKEN_TYPE.into()),
			issued_at,
			expires_at: issued_at + expires_in,
		}
	}

	/// Returns true once `now` has reached the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Returns true when the token stays valid for longer than `margin` after `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		now + margin < self.expires_at
	}

	/// Remaining lifetime at `now`, clamped to zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		(self.expires_at - now).max(Duration::ZERO)
	}

	/// `Authorization` header value. Upstream search accepts only the `Bearer` scheme.
	pub fn authorization_header(&self) -> String {
		format!("Bearer {}", self.value.expose())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("value", &self.value)
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn freshness_respects_margin() {
		let issued = datetime!(2025-01-01 00:00 UTC);
		let token = AccessToken::new("abc", None, issued, Duration::seconds(3600));
		let margin = Duration::seconds(30);

		assert_eq!(token.token_type, "Bearer");
		assert!(token.is_fresh_at(issued, margin));
		assert!(token.is_fresh_at(issued + Duration::seconds(3569), margin));
		assert!(!token.is_fresh_at(issued + Duration::seconds(3570), margin));
		assert!(!token.is_expired_at(issued + Duration::seconds(3570)));
		assert!(token.is_expired_at(issued + Duration::seconds(3600)));
		assert_eq!(token.remaining_at(issued + Duration::hours(2)), Duration::ZERO);
	}

	#[test]
	fn debug_redacts_value() {
		let token = AccessToken::new(
			"very-secret",
			Some("bearer".into()),
			datetime!(2025-01-01 00:00 UTC),
			Duration::minutes(5),
		);
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("very-secret"));
		assert_eq!(token.token_type, "bearer");
		assert_eq!(token.authorization_header(), "Bearer very-secret");
	}
}
