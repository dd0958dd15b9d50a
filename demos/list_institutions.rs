//! Lists the banks available in one country against a local mock of the Bank Account Data API,
//! showing the token exchange and the bearer-authenticated call behind a single method.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use bankdata_client::{
	api::ReqwestBankDataClient, auth::Credentials, config::ClientConfig, http::ReqwestHttpClient,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token/new/");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "access": "demo-access", "access_expires": 86_400 }));
		})
		.await;
	let institutions_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/institutions/")
				.query_param("country", "GB")
				.header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").json_body(json!([
				{ "id": "SANDBOXFINANCE_SFIN0000", "name": "Sandbox Finance", "bic": "SFIN0000" },
				{ "id": "MONZO_MONZGB2L", "name": "Monzo", "bic": "MONZGB2L" },
			]));
		})
		.await;
	let config = ClientConfig::builder().base_url(Url::parse(&server.base_url())?).build()?;
	let client = ReqwestBankDataClient::builder(config, Credentials::new("demo-id", "demo-key"))
		.build_with_http_client(ReqwestHttpClient::default());
	let institutions = client.list_institutions("GB").await?;

	for institution in institutions.as_array().into_iter().flatten() {
		println!("{} ({}).", institution["name"], institution["id"]);
	}

	if let Err(err) = client.list_institutions("gb").await {
		println!("Rejected locally with status {}: {err}", err.status());
	}

	token_mock.assert_async().await;
	institutions_mock.assert_async().await;

	Ok(())
}
