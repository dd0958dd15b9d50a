//! Authenticated request execution with bounded retries.
//!
//! [`Executor::execute`] wraps every domain call: it attaches a bearer token, bounds each
//! attempt by the configured timeout, retries transient failures on the [`RetryPolicy`]
//! schedule, and re-authenticates exactly once when the upstream rejects the token. Any other
//! failure is returned immediately.

mod retry;

pub use retry::*;

// self
use crate::{
	_prelude::*,
	clock::{Sleeper, TokioSleeper},
	config::ClientConfig,
	http::{self, ApiHttpClient, HttpRequest, Method},
	obs::{self, CallKind, CallOutcome, CallSpan},
	token::TokenManager,
};

/// Logical upstream call, resolved against the base URL on every attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// Stable operation label used in spans and events.
	pub operation: &'static str,
	/// HTTP verb.
	pub method: Method,
	/// Path relative to the base URL; segments must already be percent-encoded.
	pub path: String,
	/// Query pairs appended in order.
	pub query: Vec<(String, String)>,
	/// JSON body for `POST` calls.
	pub body: Option<Value>,
}
impl ApiRequest {
	/// Creates a `GET` request.
	pub fn get(operation: &'static str, path: impl Into<String>) -> Self {
		Self { operation, method: Method::Get, path: path.into(), query: Vec::new(), body: None }
	}

	/// Creates a `POST` request carrying `body`.
	pub fn post(operation: &'static str, path: impl Into<String>, body: Value) -> Self {
		Self {
			operation,
			method: Method::Post,
			path: path.into(),
			query: Vec::new(),
			body: Some(body),
		}
	}

	/// Appends a query pair.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}
}

/// Runs [`ApiRequest`]s with authentication, timeouts, and retries.
pub struct Executor<C>
where
	C: ?Sized + ApiHttpClient,
{
	http_client: Arc<C>,
	tokens: TokenManager<C>,
	config: Arc<ClientConfig>,
	sleeper: Arc<dyn Sleeper>,
}
impl<C> Executor<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates an executor that sleeps on the tokio timer between retries.
	pub fn new(http_client: Arc<C>, tokens: TokenManager<C>) -> Self {
		Self::with_sleeper(http_client, tokens, Arc::new(TokioSleeper))
	}

	/// Creates an executor with an explicit delay primitive.
	pub fn with_sleeper(
		http_client: Arc<C>,
		tokens: TokenManager<C>,
		sleeper: Arc<dyn Sleeper>,
	) -> Self {
		let config = Arc::clone(tokens.config());

		Self { http_client, tokens, config, sleeper }
	}

	/// Token manager used for bearer credentials.
	pub fn tokens(&self) -> &TokenManager<C> {
		&self.tokens
	}

	/// Settings in effect.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Shorthand for [`Executor::execute`] with an unlabeled request.
	pub async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
		let request = ApiRequest {
			operation: "call",
			method,
			path: path.to_owned(),
			query: Vec::new(),
			body,
		};

		self.execute(&request).await
	}

	/// Executes `request` and returns the decoded 2xx body.
	///
	/// Token acquisition failures are returned as-is. A 401/403 invalidates the cached token
	/// and restarts the call once with a fresh token and a fresh retry budget; a second
	/// rejection surfaces as [`Error::Unauthorized`]. Transport failures, 429, and 5xx are
	/// retried until the budget runs out, honoring a positive Retry-After hint.
	pub async fn execute(&self, request: &ApiRequest) -> Result<Value> {
		const KIND: CallKind = CallKind::Api;

		let span = CallSpan::new(KIND, request.operation);

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.run(request)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(err) => {
				obs::record_call_outcome(KIND, CallOutcome::Failure);
				obs::record_call_failure(KIND, err);
			},
		}

		result
	}

	async fn run(&self, request: &ApiRequest) -> Result<Value> {
		let url = self.config.endpoint(&request.path, &request.query)?;
		let mut context = RetryContext::new(self.config.retry.max_attempts);
		let mut reauthenticated = false;

		loop {
			let token = self.tokens.token().await?;
			let mut outbound = HttpRequest::new(request.method, url.clone()).with_bearer(token.secret);

			if let Some(body) = &request.body {
				outbound = outbound.with_json(body.clone());
			}

			let err = match http::send_with_timeout(
				self.http_client.as_ref(),
				outbound,
				self.config.request_timeout,
			)
			.await
			{
				Ok(response) if response.is_success() => return Ok(response.body),
				Ok(response) => Error::from_response(response),
				Err(err) => Error::from(err),
			};

			if err.is_unauthorized() && !reauthenticated {
				obs::record_call_outcome(CallKind::Api, CallOutcome::Reauthenticate);
				obs::record_call_event(
					CallKind::Api,
					CallOutcome::Reauthenticate,
					context.attempt,
					err.status(),
					None,
				);

				reauthenticated = true;
				self.tokens.invalidate();
				context = RetryContext::new(self.config.retry.max_attempts);

				continue;
			}
			if !err.is_retriable() || !context.has_remaining() {
				return Err(err);
			}

			context.record_failure(err.retry_after());

			let delay = self.config.retry.delay(&context, &mut rand::rng());

			obs::record_call_outcome(CallKind::Api, CallOutcome::Retry);
			obs::record_retry_delay(CallKind::Api, delay);
			obs::record_call_event(
				CallKind::Api,
				CallOutcome::Retry,
				context.attempt,
				err.status(),
				Some(delay),
			);

			self.sleeper.sleep(delay).await;
			context.advance();
		}
	}
}
impl<C> Clone for Executor<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			tokens: self.tokens.clone(),
			config: Arc::clone(&self.config),
			sleeper: Arc::clone(&self.sleeper),
		}
	}
}
impl<C> Debug for Executor<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Executor")
			.field("tokens", &self.tokens)
			.field("config", &self.config)
			.finish()
	}
}
