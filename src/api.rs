//! Domain operations of the Bank Account Data API.
//!
//! [`BankDataClient`] validates caller input locally, marshals it into an [`ApiRequest`], and
//! hands the request to the [`Executor`]. Invalid country codes and identifiers fail with a
//! status-400 [`ConfigError`] before any token or network call is made. Response bodies are
//! returned as raw JSON.

pub mod id;
pub mod model;

pub use id::*;
pub use model::*;

// std
use std::marker::PhantomData;
// self
use crate::{
	_prelude::*,
	auth::Credentials,
	clock::{Clock, Sleeper, SystemClock, TokioSleeper},
	config::ClientConfig,
	error::ConfigError,
	executor::{ApiRequest, Executor},
	http::ApiHttpClient,
	token::TokenManager,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestBankDataClient = BankDataClient<ReqwestHttpClient>;

/// Entry point for every upstream operation.
///
/// Clones share the transport, the token cache, and the in-flight refresh, so one client per
/// credential pair should be created at startup and cloned into request handlers.
pub struct BankDataClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	executor: Executor<C>,
}
impl<C> BankDataClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Starts a builder from validated settings and a credential pair.
	pub fn builder(config: ClientConfig, credentials: Credentials) -> BankDataClientBuilder<C> {
		BankDataClientBuilder {
			config,
			credentials,
			clock: Arc::new(SystemClock),
			sleeper: Arc::new(TokioSleeper),
			_transport: PhantomData,
		}
	}

	/// Executor backing this client, for calls not covered by a dedicated method.
	pub fn executor(&self) -> &Executor<C> {
		&self.executor
	}

	/// Token manager shared by every clone of this client.
	pub fn tokens(&self) -> &TokenManager<C> {
		self.executor.tokens()
	}

	/// `GET /institutions/?country=<code>`.
	pub async fn list_institutions(&self, country: &str) -> Result<Value> {
		let country = CountryCode::new(country)?;

		self.executor
			.execute(
				&ApiRequest::get("list_institutions", "institutions/")
					.with_query("country", country.as_str()),
			)
			.await
	}

	/// `POST /agreements/enduser/`.
	pub async fn create_end_user_agreement(&self, request: &AgreementRequest) -> Result<Value> {
		self.executor
			.execute(&ApiRequest::post(
				"create_end_user_agreement",
				"agreements/enduser/",
				request.to_body(),
			))
			.await
	}

	/// `POST /requisitions/`.
	pub async fn create_requisition(&self, request: &RequisitionRequest) -> Result<Value> {
		self.executor
			.execute(&ApiRequest::post("create_requisition", "requisitions/", request.to_body()))
			.await
	}

	/// `GET /requisitions/{id}/`.
	pub async fn get_requisition(&self, id: &str) -> Result<Value> {
		let id = RequisitionId::new(id).map_err(ConfigError::from)?;

		self.executor
			.execute(&ApiRequest::get(
				"get_requisition",
				format!("requisitions/{}/", id.path_segment()),
			))
			.await
	}

	/// `GET /requisitions/`; the upstream paginates with `count`, `next`, and `results`.
	pub async fn list_requisitions(&self) -> Result<Value> {
		self.executor.execute(&ApiRequest::get("list_requisitions", "requisitions/")).await
	}

	/// Returns the requisition whose `reference` equals `reference`, if any.
	///
	/// Only the first page returned by `GET /requisitions/` is searched.
	pub async fn find_requisition_by_reference(&self, reference: &str) -> Result<Option<Value>> {
		let listing = self.list_requisitions().await?;
		let found = listing
			.get("results")
			.and_then(Value::as_array)
			.and_then(|results| {
				results
					.iter()
					.find(|entry| entry.get("reference").and_then(Value::as_str) == Some(reference))
			})
			.cloned();

		Ok(found)
	}

	/// `GET /accounts/{id}/details/`.
	pub async fn get_account_details(&self, account_id: &str) -> Result<Value> {
		self.account_call("get_account_details", account_id, "details", &TransactionWindow::default())
			.await
	}

	/// `GET /accounts/{id}/balances/`.
	pub async fn get_account_balances(&self, account_id: &str) -> Result<Value> {
		self.account_call(
			"get_account_balances",
			account_id,
			"balances",
			&TransactionWindow::default(),
		)
		.await
	}

	/// `GET /accounts/{id}/transactions/`, bounded by `window` when set.
	pub async fn get_account_transactions(
		&self,
		account_id: &str,
		window: &TransactionWindow,
	) -> Result<Value> {
		self.account_call("get_account_transactions", account_id, "transactions", window).await
	}

	/// Fetches details and balances of one account concurrently.
	///
	/// Fails with the first error either call returns.
	pub async fn get_account_overview(&self, account_id: &str) -> Result<AccountOverview> {
		AccountId::new(account_id).map_err(ConfigError::from)?;

		let (details, balances) = futures::try_join!(
			self.get_account_details(account_id),
			self.get_account_balances(account_id)
		)?;

		Ok(AccountOverview { details, balances })
	}

	async fn account_call(
		&self,
		operation: &'static str,
		account_id: &str,
		resource: &str,
		window: &TransactionWindow,
	) -> Result<Value> {
		let id = AccountId::new(account_id).map_err(ConfigError::from)?;
		let mut request =
			ApiRequest::get(operation, format!("accounts/{}/{resource}/", id.path_segment()));

		for (key, value) in window.query() {
			request = request.with_query(key, value);
		}

		self.executor.execute(&request).await
	}
}
#[cfg(feature = "reqwest")]
impl BankDataClient<ReqwestHttpClient> {
	/// Builds a reqwest-backed client against the production API with credentials read from
	/// `GOCARDLESS_SECRET_ID` and `GOCARDLESS_SECRET_KEY`.
	pub fn from_env() -> Result<Self> {
		let config = ClientConfig::builder().build()?;
		let credentials = Credentials::from_env()?;

		Self::builder(config, credentials).build()
	}
}
impl<C> Clone for BankDataClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self { executor: self.executor.clone() }
	}
}
impl<C> Debug for BankDataClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BankDataClient").field("executor", &self.executor).finish()
	}
}

/// Builder for [`BankDataClient`]; the transport is supplied last.
pub struct BankDataClientBuilder<C>
where
	C: ?Sized + ApiHttpClient,
{
	config: ClientConfig,
	credentials: Credentials,
	clock: Arc<dyn Clock>,
	sleeper: Arc<dyn Sleeper>,
	_transport: PhantomData<fn() -> Arc<C>>,
}
impl<C> BankDataClientBuilder<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Overrides the clock consulted for token expiry.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the delay primitive used between retries.
	pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
		self.sleeper = sleeper;

		self
	}

	/// Finishes the client on top of a caller-provided transport.
	pub fn build_with_http_client(self, http_client: impl Into<Arc<C>>) -> BankDataClient<C> {
		let http_client = http_client.into();
		let tokens = TokenManager::with_clock(
			self.config,
			self.credentials,
			Arc::clone(&http_client),
			self.clock,
		);

		BankDataClient { executor: Executor::with_sleeper(http_client, tokens, self.sleeper) }
	}
}
#[cfg(feature = "reqwest")]
impl BankDataClientBuilder<ReqwestHttpClient> {
	/// Finishes the client on a freshly built reqwest transport.
	pub fn build(self) -> Result<BankDataClient<ReqwestHttpClient>> {
		let client = ReqwestClient::builder().build().map_err(ConfigError::from)?;

		Ok(self.build_with_http_client(ReqwestHttpClient::with_client(client)))
	}
}
impl<C> Debug for BankDataClientBuilder<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BankDataClientBuilder")
			.field("config", &self.config)
			.field("credentials", &self.credentials)
			.finish()
	}
}
