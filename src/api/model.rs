//! Request parameters for the domain operations.

// std
use std::str::FromStr;
// crates.io
use rand::Rng;
use serde_json::json;
use time::Date;
// self
use crate::{
	_prelude::*,
	api::{AgreementId, InstitutionId},
	error::ConfigError,
};

const REFERENCE_LEN: usize = 16;
const REFERENCE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// ISO 3166-1 alpha-2 country code, exactly two uppercase ASCII letters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct CountryCode(String);
impl CountryCode {
	/// Validates `value` without normalizing it; `"gb"` is rejected like `"USA"`.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
		let value = value.as_ref();

		if value.len() == 2 && value.bytes().all(|byte| byte.is_ascii_uppercase()) {
			Ok(Self(value.to_owned()))
		} else {
			Err(ConfigError::InvalidCountryCode { value: value.to_owned() })
		}
	}

	/// Returns the code.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl From<CountryCode> for String {
	fn from(value: CountryCode) -> Self {
		value.0
	}
}
impl Display for CountryCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for CountryCode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// Data category an end-user agreement grants access to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
	/// Account balances.
	Balances,
	/// Account holder and IBAN details.
	Details,
	/// Booked and pending transactions.
	Transactions,
}
impl AccessScope {
	/// Every scope, in upstream order.
	pub const ALL: [AccessScope; 3] =
		[AccessScope::Balances, AccessScope::Details, AccessScope::Transactions];
}

/// Body of `POST /agreements/enduser/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgreementRequest {
	/// Bank the agreement applies to.
	pub institution_id: InstitutionId,
	/// Days of transaction history that may be fetched.
	pub max_historical_days: u32,
	/// Days the granted access stays valid.
	pub access_valid_for_days: u32,
	/// Granted data categories.
	pub access_scope: Vec<AccessScope>,
}
impl AgreementRequest {
	/// Default history window and access validity, in days.
	pub const DEFAULT_DAYS: u32 = 90;

	/// Creates a request with 90/90 days and every scope.
	pub fn new(institution_id: InstitutionId) -> Self {
		Self {
			institution_id,
			max_historical_days: Self::DEFAULT_DAYS,
			access_valid_for_days: Self::DEFAULT_DAYS,
			access_scope: AccessScope::ALL.to_vec(),
		}
	}

	/// Overrides the history window.
	pub fn with_max_historical_days(mut self, days: u32) -> Self {
		self.max_historical_days = days;

		self
	}

	/// Overrides the access validity.
	pub fn with_access_valid_for_days(mut self, days: u32) -> Self {
		self.access_valid_for_days = days;

		self
	}

	/// Overrides the granted scopes.
	pub fn with_access_scope(mut self, scope: impl IntoIterator<Item = AccessScope>) -> Self {
		self.access_scope = scope.into_iter().collect();

		self
	}

	pub(crate) fn to_body(&self) -> Value {
		json!({
			"institution_id": self.institution_id,
			"max_historical_days": self.max_historical_days,
			"access_valid_for_days": self.access_valid_for_days,
			"access_scope": self.access_scope,
		})
	}
}

/// Body of `POST /requisitions/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequisitionRequest {
	/// Where the bank sends the end user after consent.
	pub redirect: Url,
	/// Bank to link.
	pub institution_id: InstitutionId,
	/// Caller-side correlation key; unique per requisition upstream.
	pub reference: String,
	/// Language of the bank consent screens.
	pub user_language: String,
	/// Agreement created beforehand; the upstream default applies when absent.
	pub agreement: Option<AgreementId>,
}
impl RequisitionRequest {
	/// Default consent screen language.
	pub const DEFAULT_USER_LANGUAGE: &'static str = "EN";

	/// Creates a request with a generated reference and English consent screens.
	pub fn new(redirect: Url, institution_id: InstitutionId) -> Self {
		Self {
			redirect,
			institution_id,
			reference: generate_reference(&mut rand::rng()),
			user_language: Self::DEFAULT_USER_LANGUAGE.to_owned(),
			agreement: None,
		}
	}

	/// Replaces the generated reference.
	pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
		self.reference = reference.into();

		self
	}

	/// Overrides the consent screen language.
	pub fn with_user_language(mut self, language: impl Into<String>) -> Self {
		self.user_language = language.into();

		self
	}

	/// Links an existing agreement.
	pub fn with_agreement(mut self, agreement: AgreementId) -> Self {
		self.agreement = Some(agreement);

		self
	}

	pub(crate) fn to_body(&self) -> Value {
		let mut body = json!({
			"redirect": self.redirect.as_str(),
			"institution_id": self.institution_id,
			"reference": self.reference,
			"user_language": self.user_language,
		});

		if let (Some(agreement), Value::Object(map)) = (&self.agreement, &mut body) {
			map.insert("agreement".into(), Value::String(agreement.to_string()));
		}

		body
	}
}

/// Optional booking-date bounds for `GET /accounts/{id}/transactions/`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransactionWindow {
	/// Inclusive lower bound.
	pub date_from: Option<Date>,
	/// Inclusive upper bound.
	pub date_to: Option<Date>,
}
impl TransactionWindow {
	/// Sets the lower bound.
	pub fn since(mut self, date: Date) -> Self {
		self.date_from = Some(date);

		self
	}

	/// Sets the upper bound.
	pub fn until(mut self, date: Date) -> Self {
		self.date_to = Some(date);

		self
	}

	/// Query pairs with dates rendered as `YYYY-MM-DD`; empty when unbounded.
	pub fn query(&self) -> Vec<(String, String)> {
		[("date_from", self.date_from), ("date_to", self.date_to)]
			.into_iter()
			.filter_map(|(key, date)| date.map(|date| (key.to_owned(), date.to_string())))
			.collect()
	}
}

/// Details and balances of one account, fetched together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountOverview {
	/// Body of `GET /accounts/{id}/details/`.
	pub details: Value,
	/// Body of `GET /accounts/{id}/balances/`.
	pub balances: Value,
}

fn generate_reference<R>(rng: &mut R) -> String
where
	R: Rng,
{
	(0..REFERENCE_LEN)
		.map(|_| char::from(REFERENCE_ALPHABET[rng.random_range(0..REFERENCE_ALPHABET.len())]))
		.collect()
}
