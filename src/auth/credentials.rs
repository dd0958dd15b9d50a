//! The secret id/key pair exchanged for bearer tokens.

// std
use std::env;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Environment variable holding the secret id.
pub const SECRET_ID_ENV: &str = "GOCARDLESS_SECRET_ID";
/// Environment variable holding the secret key.
pub const SECRET_KEY_ENV: &str = "GOCARDLESS_SECRET_KEY";

/// Credential pair presented to `POST /token/new/`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	/// Public half of the pair.
	pub secret_id: String,
	/// Private half of the pair; redacted in debug output.
	pub secret_key: TokenSecret,
}
impl Credentials {
	/// Creates a credential pair without validation; see [`Credentials::ensure_present`].
	pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
		Self { secret_id: secret_id.into(), secret_key: TokenSecret::new(secret_key) }
	}

	/// Reads [`SECRET_ID_ENV`] and [`SECRET_KEY_ENV`] from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Reads the credential pair through `lookup`, reporting every missing key at once.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let credentials = Self::new(
			lookup(SECRET_ID_ENV).unwrap_or_default(),
			lookup(SECRET_KEY_ENV).unwrap_or_default(),
		);

		credentials.ensure_present()?;

		Ok(credentials)
	}

	/// Fails when either half of the pair is blank.
	pub fn ensure_present(&self) -> Result<(), ConfigError> {
		let mut missing = Vec::new();

		if self.secret_id.trim().is_empty() {
			missing.push(SECRET_ID_ENV);
		}
		if self.secret_key.is_blank() {
			missing.push(SECRET_KEY_ENV);
		}

		if missing.is_empty() { Ok(()) } else { Err(ConfigError::MissingCredentials { missing }) }
	}

	/// Builds the JSON body expected by the token endpoint.
	pub(crate) fn token_request_body(&self) -> Value {
		serde_json::json!({
			"secret_id": self.secret_id,
			"secret_key": self.secret_key.expose(),
		})
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("secret_id", &self.secret_id)
			.field("secret_key", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	#[test]
	fn lookup_reports_every_missing_key() {
		let err = Credentials::from_lookup(|_| None).expect_err("Empty environment must fail.");

		match err {
			ConfigError::MissingCredentials { missing } =>
				assert_eq!(missing, vec![SECRET_ID_ENV, SECRET_KEY_ENV]),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn blank_values_count_as_missing() {
		let vars = HashMap::from([(SECRET_ID_ENV, "id-123"), (SECRET_KEY_ENV, "   ")]);
		let err = Credentials::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
			.expect_err("Blank key must fail.");

		assert!(matches!(
			err,
			ConfigError::MissingCredentials { ref missing } if missing == &vec![SECRET_KEY_ENV]
		));
	}

	#[test]
	fn lookup_builds_pair_and_body() {
		let vars = HashMap::from([(SECRET_ID_ENV, "id-123"), (SECRET_KEY_ENV, "key-456")]);
		let credentials = Credentials::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
			.expect("Complete environment should yield credentials.");

		assert_eq!(credentials.secret_id, "id-123");
		assert_eq!(
			credentials.token_request_body(),
			serde_json::json!({ "secret_id": "id-123", "secret_key": "key-456" })
		);
		assert!(!format!("{credentials:?}").contains("key-456"));
	}
}
