// crates.io
use httpmock::prelude::*;
// self
use mgmt_client_core::{
	_preludet::*,
	client::{ClientOptions, ManagementClient},
	error::TokenEndpointError,
	runtime::RequestDescription,
};

const CLIENT_ID: &str = "client-id";
const CLIENT_SECRET: &str = "client-secret";

fn build_credential_client(server: &MockServer) -> ManagementClient {
	build_test_client(&server.base_url(), CLIENT_ID, CLIENT_SECRET)
}

async fn mock_token_endpoint<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
	let body =
		format!("{{\"access_token\":\"{token}\",\"expires_in\":86400,\"token_type\":\"Bearer\"}}");

	server
		.mock_async(move |when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn exchanged_token_is_injected_as_bearer_header() {
	let server = MockServer::start_async().await;
	let client = build_credential_client(&server);
	let token_mock = mock_token_endpoint(&server, "m2m-token").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users").header("authorization", "Bearer m2m-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"user_id\":\"u-1\"}]");
		})
		.await;
	let response = client
		.request::<serde_json::Value>(RequestDescription::get("api/v2/users"))
		.await
		.expect("Authenticated GET should succeed.");

	assert_eq!(response.status, 200);
	assert_eq!(response.data[0]["user_id"], "u-1");

	token_mock.assert_calls_async(1).await;
	api_mock.assert_async().await;
}

#[tokio::test]
async fn token_is_exchanged_once_across_requests() {
	let server = MockServer::start_async().await;
	let client = build_credential_client(&server);
	let token_mock = mock_token_endpoint(&server, "cached-token").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/logs").header("authorization", "Bearer cached-token");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;

	for _ in 0..2 {
		client
			.request::<serde_json::Value>(RequestDescription::get("api/v2/logs"))
			.await
			.expect("Authenticated GET should succeed.");
	}

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn static_token_never_contacts_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let client = ManagementClient::new(
		ClientOptions::new(server.base_url())
			.with_token("abc")
			.with_transport(Arc::new(test_reqwest_transport())),
	)
	.expect("Static token client should build.");
	let token_mock = mock_token_endpoint(&server, "unused").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users").header("authorization", "Bearer abc");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;

	client
		.request::<serde_json::Value>(RequestDescription::get("api/v2/users"))
		.await
		.expect("Static token GET should succeed.");

	token_mock.assert_calls_async(0).await;
	api_mock.assert_async().await;
}

#[tokio::test]
async fn api_failures_surface_status_and_parsed_body() {
	let server = MockServer::start_async().await;
	let client = build_credential_client(&server);
	let _token_mock = mock_token_endpoint(&server, "m2m-token").await;
	let _api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users");
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"message\":\"boom\"}");
		})
		.await;
	let err = client
		.request::<serde_json::Value>(RequestDescription::get("api/v2/users"))
		.await
		.expect_err("A 500 from the API should surface to the caller.");
	let Error::Response(response_error) = err else {
		panic!("Expected a response error, got: {err:?}");
	};

	assert_eq!(response_error.status, 500);
	assert_eq!(response_error.to_string(), "boom");
}

#[tokio::test]
async fn token_endpoint_failure_aborts_before_the_api_call() {
	let server = MockServer::start_async().await;
	let client = build_credential_client(&server);
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(403)
				.header("content-type", "application/json")
				.body("{\"error\":\"access_denied\"}");
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let err = client
		.request::<serde_json::Value>(RequestDescription::get("api/v2/users"))
		.await
		.expect_err("A rejected exchange should abort the call.");

	assert!(matches!(err, Error::Token(TokenEndpointError::Rejected { status: 403, .. })));

	api_mock.assert_calls_async(0).await;
}
