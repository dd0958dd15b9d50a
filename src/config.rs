//! Client settings and their validating builder.

// self
use crate::{_prelude::*, error::ConfigError, executor::RetryPolicy};

/// Production base URL of the Bank Account Data API.
pub const DEFAULT_BASE_URL: &str = "https://bankaccountdata.gocardless.com/api/v2/";

/// Immutable settings shared by the token manager and the executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// API root; always ends with `/` so relative paths join beneath it.
	pub base_url: Url,
	/// Wall-clock budget for a single outbound attempt.
	pub request_timeout: StdDuration,
	/// Retry budget and backoff schedule for transient failures.
	pub retry: RetryPolicy,
	/// Tokens are treated as expired this long before their nominal expiry.
	pub expiry_margin: Duration,
}
impl ClientConfig {
	/// Default per-attempt timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(20);
	/// Default expiry margin.
	pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(30);

	/// Returns a builder seeded with the defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Resolves `path` (leading `/` optional) and `query` against the base URL.
	///
	/// Absolute URLs and paths that resolve outside the base URL are rejected, so a bearer
	/// token is only ever sent to the configured origin.
	pub fn endpoint(&self, path: &str, query: &[(String, String)]) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidPath { path: path.to_owned(), source };
		let relative = path.trim_start_matches('/');

		if Url::parse(relative).is_ok() {
			return Err(invalid(None));
		}

		let mut url = self.base_url.join(relative).map_err(|source| invalid(Some(source)))?;

		if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
			return Err(invalid(None));
		}

		if !query.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in query {
				pairs.append_pair(key, value);
			}
		}

		Ok(url)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.request_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout);
		}
		if self.retry.max_attempts == 0 {
			return Err(ConfigError::ZeroAttempts);
		}
		if self.expiry_margin.is_negative() {
			return Err(ConfigError::NegativeExpiryMargin);
		}

		Ok(())
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug, Default)]
pub struct ClientConfigBuilder {
	base_url: Option<Url>,
	request_timeout: Option<StdDuration>,
	retry: Option<RetryPolicy>,
	expiry_margin: Option<Duration>,
}
impl ClientConfigBuilder {
	/// Points the client at another API root (sandbox, mock server).
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Overrides the per-attempt timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Overrides the retry policy.
	pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry = Some(policy);

		self
	}

	/// Overrides the token expiry margin.
	pub fn expiry_margin(mut self, margin: Duration) -> Self {
		self.expiry_margin = Some(margin);

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut base_url = match self.base_url {
			Some(url) => url,
			None => Url::parse(DEFAULT_BASE_URL)
				.map_err(|source| ConfigError::InvalidBaseUrl { source })?,
		};

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: base_url.to_string() });
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let config = ClientConfig {
			base_url,
			request_timeout: self.request_timeout.unwrap_or(ClientConfig::DEFAULT_REQUEST_TIMEOUT),
			retry: self.retry.unwrap_or_default(),
			expiry_margin: self.expiry_margin.unwrap_or(ClientConfig::DEFAULT_EXPIRY_MARGIN),
		};

		config.validate()?;

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn defaults_match_upstream_contract() {
		let config = ClientConfig::builder().build().expect("Default config should build.");

		assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
		assert_eq!(config.request_timeout, StdDuration::from_secs(20));
		assert_eq!(config.retry.max_attempts, 5);
		assert_eq!(config.expiry_margin, Duration::seconds(30));
	}

	#[test]
	fn builder_appends_trailing_slash_and_joins_paths() {
		let config = ClientConfig::builder()
			.base_url(url("http://127.0.0.1:8080/api/v2"))
			.build()
			.expect("Local base URL should be accepted.");

		assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/api/v2/");

		let endpoint = config
			.endpoint("/institutions/", &[("country".into(), "GB".into())])
			.expect("Endpoint should resolve.");

		assert_eq!(endpoint.as_str(), "http://127.0.0.1:8080/api/v2/institutions/?country=GB");

		let endpoint = config.endpoint("token/new/", &[]).expect("Endpoint should resolve.");

		assert_eq!(endpoint.as_str(), "http://127.0.0.1:8080/api/v2/token/new/");
	}

	#[test]
	fn endpoint_stays_beneath_base_url() {
		let config = ClientConfig::builder()
			.base_url(url("https://bankdata.test/api/v2/"))
			.build()
			.expect("Base URL should be accepted.");

		for path in [
			"https://attacker.example/steal",
			"http://bankdata.test/api/v2/accounts/",
			"mailto:ops@bankdata.test",
			"../../admin/",
			"accounts/../../v1/accounts/",
		] {
			let err = config.endpoint(path, &[]).expect_err("Escaping path must be rejected.");

			assert!(matches!(err, ConfigError::InvalidPath { .. }), "{path}");
		}

		let endpoint =
			config.endpoint("accounts/acc%2F1/details/", &[]).expect("Nested path should resolve.");

		assert_eq!(endpoint.as_str(), "https://bankdata.test/api/v2/accounts/acc%2F1/details/");

		let endpoint = config
			.endpoint("//attacker.example/steal", &[])
			.expect("Leading slashes are trimmed before joining.");

		assert_eq!(endpoint.as_str(), "https://bankdata.test/api/v2/attacker.example/steal");
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		let err = ClientConfig::builder()
			.base_url(url("ftp://example.com/"))
			.build()
			.expect_err("Non-HTTP schemes must be rejected.");

		assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));

		let err = ClientConfig::builder()
			.request_timeout(StdDuration::ZERO)
			.build()
			.expect_err("Zero timeout must be rejected.");

		assert!(matches!(err, ConfigError::ZeroTimeout));

		let err = ClientConfig::builder()
			.retry_policy(RetryPolicy::default().with_max_attempts(0))
			.build()
			.expect_err("Zero attempts must be rejected.");

		assert!(matches!(err, ConfigError::ZeroAttempts));

		let err = ClientConfig::builder()
			.expiry_margin(Duration::seconds(-1))
			.build()
			.expect_err("Negative margin must be rejected.");

		assert!(matches!(err, ConfigError::NegativeExpiryMargin));
	}
}
