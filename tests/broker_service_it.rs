#![cfg(feature = "reqwest")]

// self
use broker_auth::{
	_preludet::*,
	broker::{
		AdapterFactory, BrokerKind, CompletionInput, LoginState, MOCK_ACCESS_TOKEN, MOCK_SESSION_ID,
	},
	config::{ADAPTER_VAR, AuthConfig, FYERS_CREDENTIALS_VAR, SECRET_KEY_VAR},
	service::AuthService,
	session::{SessionSecret, STATE_FIELD},
};

fn lookup(vars: Vec<(&'static str, String)>) -> impl Fn(&str) -> Option<String> {
	move |name| vars.iter().find(|(var, _)| *var == name).map(|(_, value)| value.clone())
}

#[tokio::test]
async fn mock_broker_round_trips_through_a_serialized_session() {
	let service = AuthService::new(AdapterFactory::with_http_client(
		test_session_store(),
		Arc::new(ScriptedHttpClient::default()),
	));
	let initiation =
		service.initiate_login("MOCK", None).await.expect("Mock initiation should succeed.");

	assert!(initiation.login_url.is_none());

	let wire = serde_json::to_string(&initiation.session).expect("Session should serialize.");
	let session: LoginState = serde_json::from_str(&wire).expect("Session should deserialize.");

	assert!(wire.contains(MOCK_SESSION_ID));
	assert_eq!(session.kind(), BrokerKind::Mock);

	let result = service
		.complete_login("mock", &mut session.clone(), CompletionInput::default())
		.await
		.expect("Mock completion should succeed.");
	let status =
		service.session_status("mock", &session).await.expect("Mock status should succeed.");

	assert_eq!(result.access_token.expose(), MOCK_ACCESS_TOKEN);
	assert!(status.is_active());
}

#[tokio::test]
async fn session_from_another_broker_is_rejected() {
	let service = AuthService::new(AdapterFactory::with_http_client(
		test_session_store(),
		Arc::new(ScriptedHttpClient::default()),
	));
	let mut initiation =
		service.initiate_login("mock", None).await.expect("Mock initiation should succeed.");
	let err = service
		.complete_login("fyers", &mut initiation.session, CompletionInput::redirect("AC", "state"))
		.await
		.expect_err("A mock session should not complete a Fyers login.");

	assert_eq!(err.error_code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn environment_configuration_drives_the_service() {
	let secret = SessionSecret::generate().to_base64();
	let config = AuthConfig::from_lookup(lookup(vec![
		(SECRET_KEY_VAR, secret),
		(ADAPTER_VAR, "fyers".into()),
		(
			FYERS_CREDENTIALS_VAR,
			"{\"app_id\":\"A\",\"secret_id\":\"S\",\"redirect_uri\":\"http://cb\"}".into(),
		),
	]))
	.expect("Configuration should load.");
	let service = AuthService::from_config(&config).expect("Service should build from config.");

	assert_eq!(service.default_broker(), BrokerKind::Fyers);

	let initiation = service
		.initiate_login(service.default_broker().as_str(), None)
		.await
		.expect("Configured defaults should be enough to start a Fyers login.");
	let login_url = initiation.login_url.expect("Fyers should return a login URL.");

	assert_eq!(login_url.host_str(), Some("api.fyers.in"));
	assert!(service.factory().sessions().contains("A", STATE_FIELD));
}
