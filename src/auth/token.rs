//! Cached bearer token with its absolute expiry.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Bearer token issued by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
	/// Opaque bearer value; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Nominal expiry reported by the upstream.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token that expires `lifetime` after `issued_at`.
	///
	/// Fails with [`ConfigError::ExpiryOutOfRange`] when the expiry is not representable.
	pub fn new(
		secret: impl Into<String>,
		issued_at: OffsetDateTime,
		lifetime: Duration,
	) -> Result<Self, ConfigError> {
		let expires_at = issued_at
			.checked_add(lifetime)
			.ok_or(ConfigError::ExpiryOutOfRange { seconds: lifetime.whole_seconds() })?;

		Ok(Self { secret: TokenSecret::new(secret), issued_at, expires_at })
	}

	/// Time left before nominal expiry at `now` (negative once expired).
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}

	/// Returns `true` while more than `margin` remains before expiry.
	pub fn is_usable_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		self.remaining_at(now) > margin
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
