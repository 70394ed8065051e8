#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use broker_auth::{
	_preludet::*,
	auth::Secret,
	broker::{CompletionInput, InactiveReason, LoginState, SessionStatus},
	flows::{FyersLoginState, FyersPhase},
	http::ReqwestHttpClient,
	service::AuthService,
	session::{ACCESS_TOKEN_FIELD, EncryptedSessionStore, REFRESH_TOKEN_FIELD, STATE_FIELD},
};

// sha256("AS")
const APP_ID_HASH: &str = "de148153b07d429235e6324fa7eff44d0e873484cafdb9742080213b1d340545";

fn credentials() -> JsonValue {
	serde_json::json!({ "app_id": "A", "secret_id": "S", "redirect_uri": "http://cb" })
}

fn build_service(
	server: &MockServer,
) -> (AuthService<ReqwestHttpClient>, Arc<EncryptedSessionStore>) {
	let (factory, sessions) = build_reqwest_test_factory(&server.base_url());

	(AuthService::new(factory), sessions)
}

fn fyers_state(session: &LoginState) -> &FyersLoginState {
	match session {
		LoginState::Fyers(state) => state,
		other => panic!("Expected a Fyers login state, got {other:?}."),
	}
}

async fn logged_in(
	server: &MockServer,
	service: &AuthService<ReqwestHttpClient>,
) -> LoginState {
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"ok\",\"access_token\":\"tok\",\"refresh_token\":\"rtok\"}");
		})
		.await;
	let initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let nonce = fyers_state(&initiation.session).nonce.clone();
	let mut session = initiation.session;

	service
		.complete_login("fyers", &mut session, CompletionInput::redirect("code1", nonce))
		.await
		.expect("Fyers completion should succeed.");
	exchange.assert_async().await;

	session
}

#[tokio::test]
async fn login_stores_nonce_and_tokens_under_the_app_id() {
	let server = MockServer::start_async().await;
	let (service, sessions) = build_service(&server);
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode").json_body(serde_json::json!({
				"grant_type": "authorization_code",
				"appIdHash": APP_ID_HASH,
				"code": "code1"
			}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"ok\",\"access_token\":\"tok\",\"refresh_token\":\"rtok\"}");
		})
		.await;
	let mut initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let login_url = initiation.login_url.clone().expect("Fyers should return a login URL.");
	let query: HashMap<String, String> = login_url.query_pairs().into_owned().collect();
	let nonce = fyers_state(&initiation.session).nonce.clone();

	assert!(login_url.path().ends_with("/generate-authcode"));
	assert!(login_url.as_str().contains("http://cb"));
	assert_eq!(query.get("client_id").map(String::as_str), Some("A"));
	assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
	assert_eq!(query.get("state"), Some(&nonce));
	assert_eq!(
		sessions.get("A", STATE_FIELD).expect("Session store should decrypt."),
		Some(nonce.clone())
	);

	let result = service
		.complete_login("fyers", &mut initiation.session, CompletionInput::redirect("code1", nonce))
		.await
		.expect("Fyers completion should succeed.");

	exchange.assert_async().await;

	assert_eq!(result.access_token.expose(), "tok");
	assert_eq!(result.refresh_token.as_ref().map(Secret::expose), Some("rtok"));
	assert_eq!(fyers_state(&initiation.session).phase, FyersPhase::TokenExchanged);
	assert!(!sessions.contains("A", STATE_FIELD));
	assert_eq!(
		sessions.get("A", ACCESS_TOKEN_FIELD).expect("Session store should decrypt."),
		Some("tok".to_owned())
	);
	assert_eq!(
		sessions.get("A", REFRESH_TOKEN_FIELD).expect("Session store should decrypt."),
		Some("rtok".to_owned())
	);
}

#[tokio::test]
async fn mismatched_state_is_rejected_before_any_network_call() {
	let server = MockServer::start_async().await;
	let (service, sessions) = build_service(&server);
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let mut initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let err = service
		.complete_login(
			"fyers",
			&mut initiation.session,
			CompletionInput::redirect("code1", "forged"),
		)
		.await
		.expect_err("A forged state should be rejected.");

	exchange.assert_calls_async(0).await;

	assert_eq!(err.error_code, "CSRF_ERROR");
	assert!(!sessions.contains("A", ACCESS_TOKEN_FIELD));
}

#[tokio::test]
async fn replayed_redirect_is_rejected_after_a_successful_exchange() {
	let server = MockServer::start_async().await;
	let (service, _) = build_service(&server);
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"ok\",\"access_token\":\"tok\"}");
		})
		.await;
	let initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let nonce = fyers_state(&initiation.session).nonce.clone();
	let mut snapshot = initiation.session.clone();
	let mut session = initiation.session;

	service
		.complete_login("fyers", &mut session, CompletionInput::redirect("code1", nonce.clone()))
		.await
		.expect("Fyers completion should succeed.");

	let err = service
		.complete_login("fyers", &mut snapshot, CompletionInput::redirect("code1", nonce))
		.await
		.expect_err("A spent nonce should not be accepted twice.");

	exchange.assert_calls_async(1).await;

	assert_eq!(err.error_code, "CSRF_ERROR");
}

#[tokio::test]
async fn failed_exchange_can_be_retried_with_a_new_code() {
	let server = MockServer::start_async().await;
	let (service, sessions) = build_service(&server);
	let mut rejected = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode");
			then.status(503)
				.header("content-type", "application/json")
				.body("{\"s\":\"error\",\"message\":\"Maintenance\"}");
		})
		.await;
	let mut initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let nonce = fyers_state(&initiation.session).nonce.clone();
	let err = service
		.complete_login(
			"fyers",
			&mut initiation.session,
			CompletionInput::redirect("code1", nonce.clone()),
		)
		.await
		.expect_err("A broker outage should fail the exchange.");

	rejected.assert_async().await;
	rejected.delete_async().await;

	assert_eq!(err.error_code, "BROKER_API_ERROR");
	assert!(sessions.contains("A", STATE_FIELD));

	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode").json_body(serde_json::json!({
				"grant_type": "authorization_code",
				"appIdHash": APP_ID_HASH,
				"code": "code2"
			}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"ok\",\"access_token\":\"tok\"}");
		})
		.await;
	let result = service
		.complete_login("fyers", &mut initiation.session, CompletionInput::redirect("code2", nonce))
		.await
		.expect("Retrying with a new auth code should succeed.");

	exchange.assert_async().await;

	assert_eq!(result.access_token.expose(), "tok");
}

#[tokio::test]
async fn redirect_url_parameters_complete_the_login() {
	let server = MockServer::start_async().await;
	let (service, _) = build_service(&server);
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"ok\",\"access_token\":\"tok\"}");
		})
		.await;
	let mut initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let nonce = fyers_state(&initiation.session).nonce.clone();
	let input = CompletionInput::from_redirect_url(&format!(
		"http://cb/?s=ok&code=200&auth_code=code1&state={nonce}"
	))
	.expect("Redirect URL should parse.");
	let result = service
		.complete_login("fyers", &mut initiation.session, input)
		.await
		.expect("Fyers completion should succeed.");

	exchange.assert_async().await;

	assert_eq!(result.access_token.expose(), "tok");
	assert!(result.refresh_token.is_none());
}

#[tokio::test]
async fn error_envelope_with_http_200_is_a_broker_api_error() {
	let server = MockServer::start_async().await;
	let (service, sessions) = build_service(&server);
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"error\",\"code\":-413,\"message\":\"Invalid auth code\"}");
		})
		.await;
	let mut initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let nonce = fyers_state(&initiation.session).nonce.clone();
	let err = service
		.complete_login("fyers", &mut initiation.session, CompletionInput::redirect("code1", nonce))
		.await
		.expect_err("An error envelope should fail the login.");

	exchange.assert_async().await;

	assert_eq!(err.error_code, "BROKER_API_ERROR");
	assert!(err.message.contains("Invalid auth code"));
	assert!(!sessions.contains("A", ACCESS_TOKEN_FIELD));
}

#[tokio::test]
async fn refresh_sends_pin_and_rotates_tokens() {
	let server = MockServer::start_async().await;
	let (service, sessions) = build_service(&server);
	let session = logged_in(&server, &service).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-refresh-token").json_body(serde_json::json!({
				"grant_type": "refresh_token",
				"appIdHash": APP_ID_HASH,
				"refresh_token": "rtok",
				"pin": "1234"
			}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"ok\",\"access_token\":\"tok-2\",\"refresh_token\":\"rtok-2\"}");
		})
		.await;
	let result = service
		.refresh("fyers", &session, &Secret::new("1234"))
		.await
		.expect("Refresh should succeed.");

	refresh.assert_async().await;

	assert_eq!(result.access_token.expose(), "tok-2");
	assert_eq!(
		sessions.get("A", ACCESS_TOKEN_FIELD).expect("Session store should decrypt."),
		Some("tok-2".to_owned())
	);
	assert_eq!(
		sessions.get("A", REFRESH_TOKEN_FIELD).expect("Session store should decrypt."),
		Some("rtok-2".to_owned())
	);
}

#[tokio::test]
async fn refresh_without_a_stored_token_is_a_precondition_failure() {
	let server = MockServer::start_async().await;
	let (service, _) = build_service(&server);
	let initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let err = service
		.refresh("fyers", &initiation.session, &Secret::new("1234"))
		.await
		.expect_err("Refresh without a refresh token should fail.");

	assert_eq!(err.error_code, "REQUEST_PRECONDITION_FAILED");
}

#[tokio::test]
async fn session_status_probes_the_profile_endpoint() {
	let server = MockServer::start_async().await;
	let (service, _) = build_service(&server);
	let initiation = service
		.initiate_login("fyers", Some(&credentials()))
		.await
		.expect("Fyers initiation should succeed.");
	let status = service
		.session_status("fyers", &initiation.session)
		.await
		.expect("A missing token should be reported, not raised.");

	assert!(matches!(status, SessionStatus::Inactive { reason: InactiveReason::NoAccessToken }));

	let session = logged_in(&server, &service).await;
	let mut profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "A:tok");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"s\":\"ok\",\"data\":{\"fy_id\":\"XA0001\"}}");
		})
		.await;
	let status =
		service.session_status("fyers", &session).await.expect("Profile probe should succeed.");

	profile.assert_async().await;

	assert!(status.is_active());

	profile.delete_async().await;

	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"s\":\"error\",\"message\":\"token expired\"}");
		})
		.await;
	let status =
		service.session_status("fyers", &session).await.expect("A rejected probe is not an error.");

	rejected.assert_async().await;

	assert!(matches!(status, SessionStatus::Inactive { reason: InactiveReason::Rejected }));
}

#[tokio::test]
async fn invalid_credentials_never_reach_the_network() {
	let server = MockServer::start_async().await;
	let (service, _) = build_service(&server);
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/validate-authcode");
			then.status(500);
		})
		.await;
	let err = service
		.initiate_login("fyers", Some(&serde_json::json!({ "app_id": "A", "secret_id": "S" })))
		.await
		.expect_err("A missing redirect URI should fail validation.");

	exchange.assert_calls_async(0).await;

	assert_eq!(err.error_code, "VALIDATION_ERROR");
}
