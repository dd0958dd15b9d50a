//! Transport primitives for upstream API calls.
//!
//! The module exposes [`ApiHttpClient`] alongside [`HttpRequest`], [`ApiResponse`], and
//! [`ResponseMetadata`] so downstream crates can plug in custom HTTP stacks (or scripted fakes)
//! without touching the token manager or the executor. Implementations only move bytes: they
//! report every HTTP response, successful or not, as `Ok` and reserve [`TransportError`] for
//! failures that never produced a status. Classification happens one layer up.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

/// Boxed future returned by [`ApiHttpClient::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing upstream calls.
///
/// The trait is the crate's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so one instance can be shared (behind `Arc`) by the token manager
/// and every concurrent executor call, and the futures they return must be `Send` so the
/// single-flight token refresh can be polled from any task.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Dispatches `request` and resolves once the full response body has been read.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// HTTP verbs used by the upstream API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// Read-only lookup.
	Get,
	/// Create-once operation.
	Post,
}
impl Method {
	/// Returns the canonical verb.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully resolved outbound request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Bearer credential for the `authorization` header.
	pub bearer: Option<TokenSecret>,
	/// JSON body, sent with `content-type: application/json`.
	pub body: Option<Value>,
}
impl HttpRequest {
	/// Creates a request without credentials or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, bearer: None, body: None }
	}

	/// Attaches a bearer credential.
	pub fn with_bearer(mut self, token: TokenSecret) -> Self {
		self.bearer = Some(token);

		self
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}
}

/// Status line and headers captured from an HTTP response.
///
/// Additional metadata fields may be added in future releases, so downstream code
/// should construct values through [`ResponseMetadata::new`] and the field setters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// Headers keyed by lower-cased name; non-UTF-8 values are skipped.
	pub headers: BTreeMap<String, String>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<StdDuration>,
}
impl ResponseMetadata {
	/// Creates metadata with no headers.
	pub fn new(status: u16) -> Self {
		Self { status, headers: BTreeMap::new(), retry_after: None }
	}

	/// Adds a header, deriving the Retry-After hint when applicable.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		let name = name.to_ascii_lowercase();
		let value = value.into();

		if name == "retry-after" {
			self.retry_after = parse_retry_after(&value, OffsetDateTime::now_utc());
		}

		self.headers.insert(name, value);

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Response handed back by an [`ApiHttpClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
	/// Status and headers.
	pub metadata: ResponseMetadata,
	/// Decoded body; see [`decode_body`].
	pub body: Value,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(metadata: ResponseMetadata, body: Value) -> Self {
		Self { metadata, body }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.metadata.is_success()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
			};
			let mut builder =
				self.0.request(method, request.url).header(ACCEPT, "application/json");

			if let Some(token) = &request.bearer {
				builder = builder.bearer_auth(token.expose());
			}
			if let Some(body) = &request.body {
				builder = builder.json(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response.headers().to_owned();
			let bytes = response.bytes().await?;
			let metadata = ResponseMetadata {
				status,
				retry_after: header_retry_after(&headers),
				headers: snapshot_headers(&headers),
			};
			let content_type = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok());

			Ok(ApiResponse::new(metadata, decode_body(content_type, &bytes)))
		})
	}
}

/// Runs `request` through `client`, cancelling it once `timeout` elapses.
pub async fn send_with_timeout<C>(
	client: &C,
	request: HttpRequest,
	timeout: StdDuration,
) -> Result<ApiResponse, TransportError>
where
	C: ?Sized + ApiHttpClient,
{
	match tokio::time::timeout(timeout, client.send(request)).await {
		Ok(result) => result,
		Err(_) => Err(TransportError::Timeout { after: timeout }),
	}
}

/// Decodes a response body: JSON when the content type says so (malformed JSON becomes `{}`),
/// otherwise the text as a JSON string.
pub fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> Value {
	let is_json = content_type.is_some_and(|value| value.contains("application/json"));

	if is_json {
		serde_json::from_slice(bytes).unwrap_or_else(|_| Value::Object(Default::default()))
	} else {
		Value::String(String::from_utf8_lossy(bytes).into_owned())
	}
}

/// Parses a Retry-After value given as delta-seconds or as an HTTP-date relative to `now`.
///
/// Returns `None` for unparsable values and for dates that already passed.
pub fn parse_retry_after(raw: &str, now: OffsetDateTime) -> Option<StdDuration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(StdDuration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return StdDuration::try_from(delta).ok();
		}
	}

	None
}

#[cfg(feature = "reqwest")]
fn header_retry_after(headers: &HeaderMap) -> Option<StdDuration> {
	let value = headers.get(RETRY_AFTER)?.to_str().ok()?;

	parse_retry_after(value, OffsetDateTime::now_utc())
}

#[cfg(feature = "reqwest")]
fn snapshot_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
	headers
		.iter()
		.filter_map(|(name, value)| {
			value.to_str().ok().map(|value| (name.as_str().to_ascii_lowercase(), value.to_owned()))
		})
		.collect()
}
