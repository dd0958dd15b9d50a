//! Walks the bank-linking flow against a local mock: create an end-user agreement, open a
//! requisition for it, then read the linked account's details and balances in one call.

// std
use std::time::Duration;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use bankdata_client::{
	api::{AgreementRequest, InstitutionId, ReqwestBankDataClient, RequisitionRequest},
	auth::Credentials,
	config::ClientConfig,
	executor::RetryPolicy,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token/new/");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "access": "demo-access", "access_expires": 86_400 }));
		})
		.await;
	let _agreement_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/agreements/enduser/");
			then.status(201)
				.header("content-type", "application/json")
				.json_body(json!({ "id": "agr-demo", "max_historical_days": 90 }));
		})
		.await;
	let _requisition_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/requisitions/");
			then.status(201).header("content-type", "application/json").json_body(json!({
				"id": "req-demo",
				"link": "https://ob.gocardless.com/psd2/start/req-demo",
				"accounts": ["acc-demo"],
			}));
		})
		.await;
	let _details_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/accounts/acc-demo/details/");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "account": { "ownerName": "Jane Doe", "currency": "GBP" } }));
		})
		.await;
	let _balances_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/accounts/acc-demo/balances/");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"balances": [{ "balanceAmount": { "amount": "1250.40", "currency": "GBP" } }],
			}));
		})
		.await;
	let config = ClientConfig::builder()
		.base_url(Url::parse(&server.base_url())?)
		.retry_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(50)))
		.build()?;
	let client =
		ReqwestBankDataClient::builder(config, Credentials::new("demo-id", "demo-key")).build()?;
	let institution = InstitutionId::new("SANDBOXFINANCE_SFIN0000")?;
	let agreement =
		client.create_end_user_agreement(&AgreementRequest::new(institution.clone())).await?;
	let agreement_id = agreement["id"].as_str().unwrap_or_default().parse()?;
	let requisition = client
		.create_requisition(
			&RequisitionRequest::new(Url::parse("https://app.example.com/callback")?, institution)
				.with_agreement(agreement_id),
		)
		.await?;

	println!("Send the end user to {}.", requisition["link"]);

	let overview = client.get_account_overview("acc-demo").await?;

	println!("Owner: {}.", overview.details["account"]["ownerName"]);
	println!("Balance: {}.", overview.balances["balances"][0]["balanceAmount"]["amount"]);
	println!("Token acquisitions: {}.", client.tokens().metrics().attempts());

	Ok(())
}
