// crates.io
use httpmock::prelude::*;
// self
use mgmt_client_core::{
	_preludet::*,
	clock::ManualClock,
	error::TokenEndpointError,
	http::ReqwestTransport,
	token::{Credentials, TokenProvider, TokenSecret},
};

const TOKEN_BODY: &str =
	"client_id=client-id&client_secret=client-secret&audience=my-api&grant_type=client_credentials";

fn build_provider(server: &MockServer) -> TokenProvider<ReqwestTransport> {
	let credentials = Credentials::new(server.base_url(), "client-id", "client-secret", "my-api")
		.expect("Credential fixture should be valid for token provider tests.");

	TokenProvider::new(credentials, test_reqwest_transport())
}

#[tokio::test]
async fn cold_cache_singleflights_concurrent_callers() {
	let server = MockServer::start_async().await;
	let provider = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body(TOKEN_BODY);
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"m2m-token\",\"expires_in\":86400,\"token_type\":\"Bearer\"}",
			);
		})
		.await;
	let (first, second, third): (
		Result<TokenSecret, Error>,
		Result<TokenSecret, Error>,
		Result<TokenSecret, Error>,
	) = tokio::join!(provider.access_token(), provider.access_token(), provider.access_token());
	let first = first.expect("First concurrent call should succeed.");
	let second = second.expect("Second concurrent call should succeed.");
	let third = third.expect("Third concurrent call should succeed.");

	assert_eq!(first.expose(), "m2m-token");
	assert_eq!(second.expose(), "m2m-token");
	assert_eq!(third.expose(), "m2m-token");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn failing_exchange_is_shared_with_concurrent_callers() {
	let server = MockServer::start_async().await;
	let provider = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"error\":\"server_error\"}");
		})
		.await;
	let (first, second, third) =
		tokio::join!(provider.access_token(), provider.access_token(), provider.access_token());

	for result in [first, second, third] {
		let err = result.expect_err("Every concurrent caller should observe the rejection.");

		assert!(matches!(err, Error::Token(TokenEndpointError::Rejected { status: 500, .. })));
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn cached_token_is_reused_until_the_leeway_window() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::pinned_now();
	let provider = build_provider(&server).with_clock(Arc::new(clock.clone()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"windowed\",\"expires_in\":86400,\"token_type\":\"Bearer\"}",
			);
		})
		.await;

	provider.access_token().await.expect("Initial fetch should succeed.");

	// One second inside the 86400 - 5 validity window: served from cache.
	clock.advance(Duration::seconds(86_394));

	provider.access_token().await.expect("Cached read should succeed.");

	mock.assert_calls_async(1).await;

	// Crossing into the leeway window forces exactly one refresh.
	clock.advance(Duration::seconds(1));

	provider.access_token().await.expect("Refresh fetch should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn failed_exchange_is_not_cached() {
	let server = MockServer::start_async().await;
	let provider = build_provider(&server);
	let mut failing = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"error\":\"server_error\"}");
		})
		.await;
	let err = provider
		.access_token()
		.await
		.expect_err("A 500 from the token endpoint should surface to the caller.");

	assert!(matches!(err, Error::Token(TokenEndpointError::Rejected { status: 500, .. })));

	failing.assert_calls_async(1).await;
	failing.delete_async().await;

	let recovered = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"fresh-token\",\"expires_in\":900,\"token_type\":\"Bearer\"}",
			);
		})
		.await;
	let token =
		provider.access_token().await.expect("The call after a failure should retry cleanly.");

	assert_eq!(token.expose(), "fresh-token");

	recovered.assert_calls_async(1).await;
}

#[tokio::test]
async fn non_positive_lifetime_still_yields_the_token() {
	let server = MockServer::start_async().await;
	let provider = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"stale\",\"expires_in\":0,\"token_type\":\"Bearer\"}");
		})
		.await;
	let first = provider.access_token().await.expect("A zero-lifetime token is still usable.");
	let second = provider.access_token().await.expect("The next call should simply re-fetch.");

	assert_eq!(first.expose(), "stale");
	assert_eq!(second.expose(), "stale");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn malformed_token_response_maps_to_parse_error() {
	let server = MockServer::start_async().await;
	let provider = build_provider(&server);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"half");
		})
		.await;
	let err = provider
		.access_token()
		.await
		.expect_err("Malformed token endpoint JSON should fail to parse.");

	assert!(matches!(err, Error::Token(TokenEndpointError::Parse { status: 200, .. })));
}

#[test]
fn provider_domain_normalization_matches_mock_urls() {
	let credentials = Credentials::new("tenant.example.com", "id", "secret", "my-api")
		.expect("Bare domains should normalize.");

	assert_eq!(
		credentials.token_endpoint,
		Url::parse("https://tenant.example.com/oauth/token")
			.expect("Fixture URL should parse successfully."),
	);
}
