//! Resilient client for the GoCardless Bank Account Data API.
//!
//! Bearer tokens are cached and refreshed single-flight, every attempt runs under a timeout,
//! and transient failures back off with Retry-After awareness behind one classified error type.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod obs;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		api::BankDataClient,
		auth::Credentials,
		clock::{SleepFuture, Sleeper},
		config::ClientConfig,
		http::ReqwestHttpClient,
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = BankDataClient<ReqwestHttpClient>;

	/// Sleeper that records every requested delay and returns immediately.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingSleeper(Arc<Mutex<Vec<StdDuration>>>);
	impl RecordingSleeper {
		/// Returns every delay requested so far, in order.
		pub fn recorded(&self) -> Vec<StdDuration> {
			self.0.lock().clone()
		}
	}
	impl Sleeper for RecordingSleeper {
		fn sleep(&self, duration: StdDuration) -> SleepFuture {
			self.0.lock().push(duration);

			Box::pin(async {})
		}
	}

	/// Builds a config pointing at `base_url` with the crate defaults for everything else.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder()
			.base_url(Url::parse(base_url).expect("Failed to parse test base URL."))
			.build()
			.expect("Failed to build test client config.")
	}

	/// Constructs a [`BankDataClient`] that talks to `base_url` over reqwest and records
	/// backoff delays instead of sleeping.
	pub fn build_reqwest_test_client(
		base_url: &str,
		secret_id: &str,
		secret_key: &str,
	) -> (ReqwestTestClient, RecordingSleeper) {
		let sleeper = RecordingSleeper::default();
		let client =
			ReqwestTestClient::builder(test_config(base_url), Credentials::new(secret_id, secret_key))
				.sleeper(Arc::new(sleeper.clone()))
				.build_with_http_client(ReqwestHttpClient::default());

		(client, sleeper)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
