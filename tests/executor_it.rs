// std
use std::{
	collections::VecDeque,
	io,
	sync::atomic::{AtomicUsize, Ordering},
};
// crates.io
use serde_json::json;
// self
use bankdata_client::{
	_preludet::*,
	auth::Credentials,
	config::ClientConfig,
	error::{ConfigError, ErrorClass, TransportError},
	executor::{ApiRequest, Executor},
	http::{ApiHttpClient, ApiResponse, HttpRequest, Method, ResponseMetadata, TransportFuture},
	token::TokenManager,
};

enum Step {
	Respond(ResponseMetadata, Value),
	Stall,
	Disconnect,
}
impl Step {
	fn status(status: u16) -> Self {
		Self::Respond(ResponseMetadata::new(status), json!({ "status_code": status }))
	}

	fn ok(body: Value) -> Self {
		Self::Respond(ResponseMetadata::new(200), body)
	}
}

// Mints numbered tokens and replays a fixed script for every API call.
#[derive(Default)]
struct ScriptedHttpClient {
	token_status: Option<u16>,
	tokens_issued: AtomicUsize,
	script: Mutex<VecDeque<Step>>,
	api_calls: Mutex<Vec<HttpRequest>>,
}
impl ScriptedHttpClient {
	fn new(script: impl IntoIterator<Item = Step>) -> Arc<Self> {
		Arc::new(Self { script: Mutex::new(script.into_iter().collect()), ..Default::default() })
	}

	fn failing_token(status: u16) -> Arc<Self> {
		Arc::new(Self { token_status: Some(status), ..Default::default() })
	}

	fn api_calls(&self) -> Vec<HttpRequest> {
		self.api_calls.lock().clone()
	}

	fn bearers(&self) -> Vec<String> {
		self.api_calls()
			.into_iter()
			.filter_map(|request| request.bearer.map(|secret| secret.expose().to_owned()))
			.collect()
	}

	fn tokens_issued(&self) -> usize {
		self.tokens_issued.load(Ordering::SeqCst)
	}
}
impl ApiHttpClient for ScriptedHttpClient {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		if request.url.path().ends_with("/token/new/") {
			let response = match self.token_status {
				Some(status) => ApiResponse::new(
					ResponseMetadata::new(status),
					json!({ "detail": "Authentication failed" }),
				),
				None => {
					let issued = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;

					ApiResponse::new(
						ResponseMetadata::new(200),
						json!({ "access": format!("token-{issued}"), "access_expires": 86_400 }),
					)
				},
			};

			return Box::pin(async move { Ok(response) });
		}

		self.api_calls.lock().push(request);

		let step = self.script.lock().pop_front();

		Box::pin(async move {
			match step {
				Some(Step::Respond(metadata, body)) => Ok(ApiResponse::new(metadata, body)),
				Some(Step::Stall) => {
					tokio::time::sleep(StdDuration::from_secs(60)).await;

					Ok(ApiResponse::new(ResponseMetadata::new(200), Value::Null))
				},
				Some(Step::Disconnect) =>
					Err(TransportError::network(io::Error::other("Connection reset by peer."))),
				None => panic!("Transport script exhausted."),
			}
		})
	}
}

fn build_executor(
	transport: &Arc<ScriptedHttpClient>,
	config: ClientConfig,
) -> (Executor<ScriptedHttpClient>, RecordingSleeper) {
	let sleeper = RecordingSleeper::default();
	let tokens = TokenManager::new(config, Credentials::new("id", "key"), Arc::clone(transport));
	let executor = Executor::with_sleeper(Arc::clone(transport), tokens, Arc::new(sleeper.clone()));

	(executor, sleeper)
}

fn default_executor(
	transport: &Arc<ScriptedHttpClient>,
) -> (Executor<ScriptedHttpClient>, RecordingSleeper) {
	build_executor(transport, test_config("http://bankdata.test/api/v2/"))
}

fn request() -> ApiRequest {
	ApiRequest::get("get_account_balances", "accounts/acc-1/balances/")
}

fn ms(value: u64) -> StdDuration {
	StdDuration::from_millis(value)
}

#[tokio::test]
async fn retry_after_overrides_backoff() {
	let transport = ScriptedHttpClient::new([
		Step::Respond(ResponseMetadata::new(429).with_header("Retry-After", "2"), json!({})),
		Step::ok(json!({ "balances": [] })),
	]);
	let (executor, sleeper) = default_executor(&transport);
	let body = executor.execute(&request()).await.expect("Second attempt should succeed.");

	assert_eq!(body, json!({ "balances": [] }));
	assert_eq!(sleeper.recorded(), vec![StdDuration::from_secs(2)]);
	assert_eq!(transport.api_calls().len(), 2);
}

#[tokio::test]
async fn zero_retry_after_uses_backoff() {
	let transport = ScriptedHttpClient::new([
		Step::Respond(ResponseMetadata::new(429).with_header("Retry-After", "0"), json!({})),
		Step::ok(json!({})),
	]);
	let (executor, sleeper) = default_executor(&transport);

	executor.execute(&request()).await.expect("Second attempt should succeed.");

	let delays = sleeper.recorded();

	assert_eq!(delays.len(), 1);
	assert!(delays[0] >= ms(300) && delays[0] < ms(500), "Unexpected delay {:?}.", delays[0]);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_five_attempts() {
	let transport = ScriptedHttpClient::new((0..5).map(|_| Step::status(503)));
	let (executor, sleeper) = default_executor(&transport);
	let err = executor.execute(&request()).await.expect_err("Every attempt fails.");

	assert_eq!(err.status(), 503);
	assert_eq!(err.class(), ErrorClass::Transient);
	assert!(matches!(err, Error::Transient(_)));
	assert_eq!(transport.api_calls().len(), 5);

	let delays = sleeper.recorded();
	let floors = [300, 600, 1_200, 2_400];

	assert_eq!(delays.len(), floors.len());

	for (delay, floor) in delays.into_iter().zip(floors) {
		assert!(delay >= ms(floor) && delay < ms(floor + 200), "Unexpected delay {delay:?}.");
	}
}

#[tokio::test]
async fn success_on_fifth_attempt_returns_body() {
	let transport = ScriptedHttpClient::new(
		(0..4).map(|_| Step::status(503)).chain([Step::ok(json!({ "account": { "iban": "GB" } }))]),
	);
	let (executor, sleeper) = default_executor(&transport);
	let body = executor.execute(&request()).await.expect("Fifth attempt should succeed.");

	assert_eq!(body["account"]["iban"], "GB");
	assert_eq!(transport.api_calls().len(), 5);
	assert_eq!(sleeper.recorded().len(), 4);
}

#[tokio::test]
async fn forbidden_forces_one_reauthentication() {
	let transport = ScriptedHttpClient::new([Step::status(403), Step::ok(json!({ "id": "acc-1" }))]);
	let (executor, sleeper) = default_executor(&transport);
	let body = executor.execute(&request()).await.expect("Re-authenticated attempt should succeed.");

	assert_eq!(body["id"], "acc-1");
	assert_eq!(transport.bearers(), vec!["token-1", "token-2"]);
	assert_eq!(transport.tokens_issued(), 2);

	let cached = executor.tokens().cached().expect("Fresh token should be cached.");

	assert_eq!(cached.secret.expose(), "token-2");
	assert!(sleeper.recorded().is_empty());
}

#[tokio::test]
async fn repeated_unauthorized_is_fatal() {
	let transport = ScriptedHttpClient::new([Step::status(401), Step::status(403)]);
	let (executor, _sleeper) = default_executor(&transport);
	let err = executor.execute(&request()).await.expect_err("Second rejection is fatal.");

	assert!(matches!(err, Error::Unauthorized(_)));
	assert_eq!(err.status(), 403);
	assert_eq!(err.class(), ErrorClass::Authentication);
	assert_eq!(transport.api_calls().len(), 2);
	assert_eq!(transport.tokens_issued(), 2);
}

#[tokio::test]
async fn reauthentication_starts_a_fresh_retry_budget() {
	let transport = ScriptedHttpClient::new(
		(0..4)
			.map(|_| Step::status(502))
			.chain([Step::status(401), Step::status(500), Step::ok(json!({}))]),
	);
	let (executor, sleeper) = default_executor(&transport);

	executor.execute(&request()).await.expect("Call should recover after re-authentication.");

	assert_eq!(transport.api_calls().len(), 7);
	assert_eq!(sleeper.recorded().len(), 5);
	assert_eq!(transport.tokens_issued(), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
	let transport = ScriptedHttpClient::new([Step::Respond(
		ResponseMetadata::new(404).with_header("x-request-id", "req-9"),
		json!({ "summary": "Not found", "detail": "Account not found.", "status_code": 404 }),
	)]);
	let (executor, sleeper) = default_executor(&transport);
	let err = executor.execute(&request()).await.expect_err("404 is fatal.");

	assert!(matches!(err, Error::Rejected(_)));
	assert_eq!(err.status(), 404);
	assert_eq!(err.to_string(), "Account not found.");

	let details = err.details().expect("Upstream failures carry details.");

	assert_eq!(details.body["summary"], "Not found");
	assert_eq!(details.headers.get("x-request-id").map(String::as_str), Some("req-9"));
	assert_eq!(transport.api_calls().len(), 1);
	assert!(sleeper.recorded().is_empty());
}

#[tokio::test]
async fn timeouts_are_retried_then_surfaced() {
	let config = ClientConfig::builder()
		.base_url(Url::parse("http://bankdata.test/api/v2/").expect("Valid test URL."))
		.request_timeout(ms(25))
		.build()
		.expect("Config with short timeout should build.");
	let transport = ScriptedHttpClient::new([Step::Stall, Step::ok(json!({ "ok": true }))]);
	let (executor, sleeper) = build_executor(&transport, config.clone());
	let body = executor.execute(&request()).await.expect("Attempt after timeout should succeed.");

	assert_eq!(body["ok"], true);
	assert_eq!(sleeper.recorded().len(), 1);

	let transport = ScriptedHttpClient::new((0..5).map(|_| Step::Stall));
	let (executor, _sleeper) = build_executor(&transport, config);
	let err = executor.execute(&request()).await.expect_err("Every attempt times out.");

	assert!(matches!(err, Error::Transport(TransportError::Timeout { .. })));
	assert_eq!(err.status(), 500);
	assert_eq!(transport.api_calls().len(), 5);
}

#[tokio::test]
async fn network_failures_are_retried() {
	let transport = ScriptedHttpClient::new([Step::Disconnect, Step::ok(json!([]))]);
	let (executor, sleeper) = default_executor(&transport);

	executor.execute(&request()).await.expect("Attempt after reconnect should succeed.");

	assert_eq!(transport.api_calls().len(), 2);
	assert_eq!(sleeper.recorded().len(), 1);
}

#[tokio::test]
async fn token_failure_skips_the_api_call() {
	let transport = ScriptedHttpClient::failing_token(401);
	let (executor, sleeper) = default_executor(&transport);
	let err = executor.execute(&request()).await.expect_err("Token failure propagates.");

	assert_eq!(err.status(), 401);
	assert_eq!(err.to_string(), "Authentication failed");
	assert!(transport.api_calls().is_empty());
	assert!(sleeper.recorded().is_empty());
	assert_eq!(executor.tokens().metrics().failures(), 1);
}

#[tokio::test]
async fn requests_carry_method_body_query_and_bearer() {
	let transport = ScriptedHttpClient::new([
		Step::ok(json!({ "id": "agr-1" })),
		Step::ok(json!({ "results": [] })),
	]);
	let (executor, _sleeper) = default_executor(&transport);

	executor
		.execute(
			&ApiRequest::post("create", "agreements/enduser/", json!({ "institution_id": "X" }))
				.with_query("trace", "on"),
		)
		.await
		.expect("Scripted call should succeed.");
	executor
		.call(Method::Get, "/requisitions/", None)
		.await
		.expect("Scripted call should succeed.");

	let calls = transport.api_calls();

	assert_eq!(calls[0].method, Method::Post);
	assert_eq!(calls[0].url.as_str(), "http://bankdata.test/api/v2/agreements/enduser/?trace=on");
	assert_eq!(calls[0].body, Some(json!({ "institution_id": "X" })));
	assert_eq!(calls[1].method, Method::Get);
	assert_eq!(calls[1].url.as_str(), "http://bankdata.test/api/v2/requisitions/");
	assert_eq!(calls[1].body, None);
	assert_eq!(transport.bearers(), vec!["token-1", "token-1"]);
	assert_eq!(transport.tokens_issued(), 1);
}

#[tokio::test]
async fn paths_outside_the_base_url_never_receive_the_token() {
	let transport = ScriptedHttpClient::new([]);
	let (executor, _sleeper) = default_executor(&transport);

	for path in ["https://attacker.example/steal", "../../../steal/"] {
		let err = executor
			.call(Method::Get, path, None)
			.await
			.expect_err("Path escaping the base URL must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidPath { .. })), "{path}");
	}

	assert!(transport.api_calls().is_empty());
	assert_eq!(transport.tokens_issued(), 0);
}

#[test]
fn executor_shares_the_token_manager_config() {
	let transport = ScriptedHttpClient::new([]);
	let (executor, _sleeper) = default_executor(&transport);

	assert!(std::ptr::eq(executor.config(), executor.tokens().config().as_ref()));
}
