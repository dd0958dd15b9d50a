//! Bearer-token lifecycle: acquisition, expiry tracking, and single-flight refresh.
//!
//! [`TokenManager::token`] returns the cached token while more than the configured expiry
//! margin remains. Otherwise the first caller publishes a shared refresh future under the
//! state lock, and every caller that arrives before it resolves awaits that same future, so N
//! concurrent callers cost exactly one `POST /token/new/`. The refresh future owns its own
//! handle to the shared state: it stores the token and clears the in-flight marker itself,
//! which means dropping one awaiter never cancels the refresh for the others. A panic inside
//! the acquisition is turned into [`ConfigError::AcquisitionAborted`] so the marker is cleared
//! on that path too.

// std
use std::{
	panic::AssertUnwindSafe,
	sync::atomic::{AtomicU64, Ordering},
};
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials},
	clock::{Clock, SystemClock},
	config::ClientConfig,
	error::ConfigError,
	http::{self, ApiHttpClient, HttpRequest, Method},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

const TOKEN_PATH: &str = "token/new/";

type RefreshFuture = Shared<BoxFuture<'static, Result<AccessToken>>>;

/// Process-wide token cache shared by every clone of a [`TokenManager`].
#[derive(Default)]
struct TokenState {
	token: Option<AccessToken>,
	in_flight: Option<RefreshFuture>,
}

struct TokenShared<C>
where
	C: ?Sized + ApiHttpClient,
{
	http_client: Arc<C>,
	credentials: Credentials,
	config: Arc<ClientConfig>,
	clock: Arc<dyn Clock>,
	state: Mutex<TokenState>,
	metrics: AcquisitionMetrics,
}
impl<C> TokenShared<C>
where
	C: ?Sized + ApiHttpClient,
{
	async fn acquire_guarded(&self) -> Result<AccessToken> {
		match AssertUnwindSafe(self.acquire()).catch_unwind().await {
			Ok(result) => result,
			Err(_) => {
				self.metrics.record_failure();

				Err(ConfigError::AcquisitionAborted.into())
			},
		}
	}

	async fn acquire(&self) -> Result<AccessToken> {
		self.credentials.ensure_present()?;
		self.metrics.record_attempt();

		match self.request_token().await {
			Ok(token) => {
				self.metrics.record_success();

				Ok(token)
			},
			Err(err) => {
				self.metrics.record_failure();

				Err(err)
			},
		}
	}

	async fn request_token(&self) -> Result<AccessToken> {
		let url = self.config.endpoint(TOKEN_PATH, &[])?;
		let request =
			HttpRequest::new(Method::Post, url).with_json(self.credentials.token_request_body());
		let response = http::send_with_timeout(
			self.http_client.as_ref(),
			request,
			self.config.request_timeout,
		)
		.await
		.map_err(Error::from)?;

		if !response.is_success() {
			return Err(Error::from_response(response));
		}

		let parsed: TokenResponse =
			serde_path_to_error::deserialize(response.body).map_err(|err| {
				ConfigError::TokenResponse {
					path: err.path().to_string(),
					message: err.inner().to_string(),
				}
			})?;

		parsed.into_access_token(self.clock.now(), self.config.expiry_margin)
	}

	fn complete(&self, result: &Result<AccessToken>) {
		let mut state = self.state.lock();

		state.in_flight = None;

		if let Ok(token) = result {
			state.token = Some(token.clone());
		}
	}
}

/// Thread-safe counters describing how callers were served.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
	cache_hits: AtomicU64,
	joins: AtomicU64,
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
}
impl AcquisitionMetrics {
	/// Calls answered from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Calls that awaited an acquisition another caller had already started.
	pub fn joins(&self) -> u64 {
		self.joins.load(Ordering::Relaxed)
	}

	/// Acquisitions started; one per upstream token call.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Acquisitions that produced a token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Acquisitions that failed, including aborted ones.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	fn record_join(&self) {
		self.joins.fetch_add(1, Ordering::Relaxed);
	}

	fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

/// Produces currently-valid bearer tokens for the executor.
///
/// Cloning is cheap and every clone shares one cache and one in-flight refresh.
pub struct TokenManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	shared: Arc<TokenShared<C>>,
}
impl<C> TokenManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates an empty manager; the first [`TokenManager::token`] call acquires a token.
	pub fn new(
		config: impl Into<Arc<ClientConfig>>,
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self::with_clock(config, credentials, http_client, Arc::new(SystemClock))
	}

	/// Same as [`TokenManager::new`] with an explicit clock for expiry checks.
	pub fn with_clock(
		config: impl Into<Arc<ClientConfig>>,
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let shared = TokenShared {
			http_client: http_client.into(),
			credentials,
			config: config.into(),
			clock,
			state: Mutex::new(TokenState::default()),
			metrics: AcquisitionMetrics::default(),
		};

		Self { shared: Arc::new(shared) }
	}

	/// Returns a token with more than the expiry margin left, acquiring one when needed.
	///
	/// Concurrent callers that find the cache empty or stale share a single acquisition and
	/// all observe its outcome, including the same error. A failed acquisition clears the
	/// in-flight marker so the next call starts a fresh one.
	pub async fn token(&self) -> Result<AccessToken> {
		let refresh = {
			let mut state = self.shared.state.lock();
			let now = self.shared.clock.now();

			if let Some(token) =
				state.token.as_ref().filter(|token| token.is_usable_at(now, self.margin()))
			{
				self.shared.metrics.record_cache_hit();

				return Ok(token.clone());
			}

			if let Some(refresh) = state.in_flight.clone() {
				self.shared.metrics.record_join();

				refresh
			} else {
				state.in_flight.insert(self.start_refresh()).clone()
			}
		};

		refresh.await
	}

	/// Drops the cached token so the next [`TokenManager::token`] call re-acquires.
	///
	/// An in-flight refresh is left untouched.
	pub fn invalidate(&self) {
		self.shared.state.lock().token = None;
	}

	/// Returns the cached token regardless of freshness.
	pub fn cached(&self) -> Option<AccessToken> {
		self.shared.state.lock().token.clone()
	}

	/// Returns `true` while an acquisition is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.shared.state.lock().in_flight.is_some()
	}

	/// Cache, join, and acquisition counters.
	pub fn metrics(&self) -> &AcquisitionMetrics {
		&self.shared.metrics
	}

	/// Settings shared with the executor.
	pub fn config(&self) -> &Arc<ClientConfig> {
		&self.shared.config
	}

	fn margin(&self) -> Duration {
		self.shared.config.expiry_margin
	}

	fn start_refresh(&self) -> RefreshFuture {
		const KIND: CallKind = CallKind::TokenAcquisition;

		let shared = Arc::clone(&self.shared);

		async move {
			let span = CallSpan::new(KIND, "acquire_token");

			obs::record_call_outcome(KIND, CallOutcome::Attempt);

			let result = span.instrument(shared.acquire_guarded()).await;

			shared.complete(&result);

			match &result {
				Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
				Err(err) => {
					obs::record_call_outcome(KIND, CallOutcome::Failure);
					obs::record_call_failure(KIND, err);
				},
			}

			result
		}
		.boxed()
		.shared()
	}
}
impl<C> Clone for TokenManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self { shared: Arc::clone(&self.shared) }
	}
}
impl<C> Debug for TokenManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.shared.state.lock();

		f.debug_struct("TokenManager")
			.field("credentials", &self.shared.credentials)
			.field("token", &state.token)
			.field("refreshing", &state.in_flight.is_some())
			.finish()
	}
}

/// Body of a successful `POST /token/new/`; only the access half is consumed.
#[derive(Debug, Deserialize)]
struct TokenResponse {
	access: Option<String>,
	access_expires: Option<i64>,
}
impl TokenResponse {
	fn into_access_token(self, now: OffsetDateTime, margin: Duration) -> Result<AccessToken> {
		let access =
			self.access.filter(|value| !value.is_empty()).ok_or(ConfigError::MissingAccessToken)?;
		let seconds = self.access_expires.ok_or(ConfigError::MissingExpiry)?;
		let lifetime = Duration::seconds(seconds);

		if lifetime <= margin {
			return Err(ConfigError::ExpiryTooShort {
				seconds,
				margin_seconds: margin.whole_seconds(),
			}
			.into());
		}

		AccessToken::new(access, now, lifetime).map_err(Error::from)
	}
}
