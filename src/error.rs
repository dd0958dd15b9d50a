//! Classified error types shared by the token manager, the executor, and the domain layer.
//!
//! Every failure surfaces as one [`Error`] whose variant is its classification, so callers
//! branch with `match` instead of inspecting message strings. Upstream failures carry the
//! HTTP status, the best available message, and the raw body + headers for diagnosis.

// self
use crate::{_prelude::*, api::IdentifierError, http::ApiResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Status reported when a failure never produced an HTTP response.
pub const UNKNOWN_STATUS: u16 = 500;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem or malformed caller input; no network call was made.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Network failure or per-attempt timeout; retried before surfacing.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Upstream rate limiting (429) or server error (5xx) that outlived every retry.
	#[error("{0}")]
	Transient(UpstreamFailure),
	/// Upstream rejected the bearer token (401/403) even after a forced re-authentication.
	#[error("{0}")]
	Unauthorized(UpstreamFailure),
	/// Upstream rejected the request itself (any other non-2xx status); never retried.
	#[error("{0}")]
	Rejected(UpstreamFailure),
}
impl Error {
	/// Classifies a non-2xx upstream response.
	pub fn from_response(response: ApiResponse) -> Self {
		let failure = UpstreamFailure::from_response(response);

		match failure.status {
			401 | 403 => Self::Unauthorized(failure),
			429 | 500..=599 => Self::Transient(failure),
			_ => Self::Rejected(failure),
		}
	}

	/// Returns the coarse classification of the failure.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Config(_) => ErrorClass::Configuration,
			Self::Transport(_) | Self::Transient(_) => ErrorClass::Transient,
			Self::Unauthorized(_) => ErrorClass::Authentication,
			Self::Rejected(_) => ErrorClass::ClientRequest,
		}
	}

	/// Returns the HTTP status that best describes the failure.
	pub fn status(&self) -> u16 {
		match self {
			Self::Config(err) => err.status(),
			Self::Transport(_) => UNKNOWN_STATUS,
			Self::Transient(failure) | Self::Unauthorized(failure) | Self::Rejected(failure) =>
				failure.status,
		}
	}

	/// Returns the upstream failure, when the error originated from an HTTP response.
	pub fn upstream(&self) -> Option<&UpstreamFailure> {
		match self {
			Self::Transient(failure) | Self::Unauthorized(failure) | Self::Rejected(failure) =>
				Some(failure),
			Self::Config(_) | Self::Transport(_) => None,
		}
	}

	/// Returns the raw upstream body + headers, when available.
	pub fn details(&self) -> Option<&ErrorDetails> {
		self.upstream().map(|failure| &failure.details)
	}

	/// Returns the Retry-After hint recorded from the upstream response.
	pub fn retry_after(&self) -> Option<StdDuration> {
		self.upstream().and_then(|failure| failure.retry_after)
	}

	/// Returns `true` when the executor may retry the call after a delay.
	pub fn is_retriable(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Transient(_))
	}

	/// Returns `true` for 401/403 upstream responses.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Unauthorized(_))
	}
}

/// Coarse failure classes callers can branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
	/// Missing credentials, invalid settings, or malformed caller input.
	Configuration,
	/// Rate limiting, server errors, timeouts, and network failures.
	Transient,
	/// The upstream refused the credential.
	Authentication,
	/// The upstream refused the request; retrying will not help.
	ClientRequest,
}

/// Configuration and validation failures raised before (or instead of) a network call.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Credential environment variables are absent or empty.
	#[error("Missing required credential(s): {}.", .missing.join(", "))]
	MissingCredentials {
		/// Names of the missing settings.
		missing: Vec<&'static str>,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than `http`/`https`.
	#[error("Base URL `{url}` must use http or https.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// Endpoint path is absolute, escapes the base URL, or cannot be joined onto it.
	#[error("Endpoint path `{path}` is invalid.")]
	InvalidPath {
		/// Offending relative path.
		path: String,
		/// Underlying parsing failure, when joining failed outright.
		#[source]
		source: Option<url::ParseError>,
	},
	/// Per-attempt timeout must be positive.
	#[error("Request timeout must be greater than zero.")]
	ZeroTimeout,
	/// Retry policy must allow at least one attempt.
	#[error("Retry policy must allow at least one attempt.")]
	ZeroAttempts,
	/// Expiry margin must not be negative.
	#[error("Token expiry margin must not be negative.")]
	NegativeExpiryMargin,

	/// Country code is not exactly two uppercase ASCII letters.
	#[error("Country code `{value}` must be a 2-letter uppercase ISO 3166-1 code.")]
	InvalidCountryCode {
		/// Rejected input.
		value: String,
	},
	/// Resource identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),

	/// Token endpoint response did not match the expected shape.
	#[error("Token response is malformed at `{path}`: {message}.")]
	TokenResponse {
		/// JSON path of the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
	/// Token endpoint response omitted `access`.
	#[error("Token response is missing the access token.")]
	MissingAccessToken,
	/// Token endpoint response omitted `access_expires`.
	#[error("Token response is missing access_expires.")]
	MissingExpiry,
	/// Token lifetime does not outlast the expiry margin.
	#[error("Token lifetime of {seconds}s does not exceed the {margin_seconds}s expiry margin.")]
	ExpiryTooShort {
		/// Lifetime reported by the token endpoint.
		seconds: i64,
		/// Configured expiry margin.
		margin_seconds: i64,
	},
	/// Token lifetime puts the expiry past the representable date range.
	#[error("Token lifetime of {seconds}s is out of range.")]
	ExpiryOutOfRange {
		/// Lifetime reported by the token endpoint.
		seconds: i64,
	},
	/// Token acquisition panicked before producing a result.
	#[error("Token acquisition aborted unexpectedly.")]
	AcquisitionAborted,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}

	/// Returns 400 for caller input errors and 500 for everything else.
	pub fn status(&self) -> u16 {
		match self {
			Self::InvalidCountryCode { .. } | Self::InvalidIdentifier(_) => 400,
			_ => UNKNOWN_STATUS,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeout); both are retriable.
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The attempt exceeded its wall-clock budget and was cancelled.
	#[error("Upstream call timed out after {}ms.", .after.as_millis())]
	Timeout {
		/// Budget that was exceeded.
		after: StdDuration,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Non-2xx upstream response, reduced to what callers need.
#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct UpstreamFailure {
	/// HTTP status returned by the upstream.
	pub status: u16,
	/// Upstream `detail`/`message` field, or a generic phrase.
	pub message: String,
	/// Raw body and headers.
	pub details: ErrorDetails,
	/// Parsed Retry-After hint.
	pub retry_after: Option<StdDuration>,
}
impl UpstreamFailure {
	/// Builds a failure from a non-2xx response.
	pub fn from_response(response: ApiResponse) -> Self {
		let ApiResponse { metadata, body } = response;
		let message = upstream_message(&body)
			.unwrap_or_else(|| format!("Request failed with status {}.", metadata.status));

		Self {
			status: metadata.status,
			message,
			details: ErrorDetails { body, headers: metadata.headers },
			retry_after: metadata.retry_after,
		}
	}
}

/// Diagnostic payload attached to upstream failures.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ErrorDetails {
	/// Decoded response body (JSON, or a JSON string for non-JSON bodies).
	pub body: Value,
	/// Response headers keyed by lower-cased name.
	pub headers: BTreeMap<String, String>,
}

fn upstream_message(body: &Value) -> Option<String> {
	["detail", "message"].into_iter().find_map(|field| match body.get(field)? {
		Value::Null => None,
		Value::String(text) if text.is_empty() => None,
		Value::String(text) => Some(text.clone()),
		other => Some(other.to_string()),
	})
}
