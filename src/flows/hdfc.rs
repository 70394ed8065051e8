//! Five-step login for HDFC Securities InvestRight.
//!
//! `initiate_login` runs step 1 (token issuance) and step 2 (credential validation) and reports
//! whether a second factor is pending. `complete_login` resumes from the phase recorded in
//! [`HdfcLoginState`] and runs the remaining steps strictly in order: 2FA validation (only when
//! required), consent authorisation, then access-token issuance.

mod steps;

pub use steps::{HdfcLoginState, HdfcPhase};

// self
use crate::{
	_prelude::*,
	auth::{HdfcCredentials, Secret, parse_credentials},
	broker::{
		AuthResult, BrokerAdapter, BrokerFuture, BrokerKind, CompletionInput, LoginInitiation,
		LoginState,
	},
	error::PreconditionError,
	flows::{FlowContext, common},
	http::{BrokerHttpClient, BrokerRequest},
	obs::{self, FlowKind},
	session::ACCESS_TOKEN_FIELD,
};
use steps::*;

const ISSUE_TOKEN_STAGE: &str = "issue_token";
const VALIDATE_CREDENTIALS_STAGE: &str = "validate_credentials";
const VALIDATE_TWO_FA_STAGE: &str = "validate_two_fa";
const AUTHORISE_STAGE: &str = "authorise";
const ACCESS_TOKEN_STAGE: &str = "issue_access_token";

/// HDFC login flow bound to one transport and session store.
pub struct HdfcAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	ctx: FlowContext<C>,
}
impl<C> HdfcAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Wraps a flow context whose descriptor points at the HDFC API.
	pub fn new(ctx: FlowContext<C>) -> Self {
		Self { ctx }
	}

	/// Runs steps 1 and 2.
	///
	/// The returned state is in [`HdfcPhase::TwoFaPending`] when the broker demands a one-time
	/// code (the prompt is in [`HdfcLoginState::challenge`]), otherwise in
	/// [`HdfcPhase::CredentialsValidated`].
	pub async fn initiate_login(&self, credentials: HdfcCredentials) -> Result<HdfcLoginState> {
		obs::observe(FlowKind::HdfcLogin, "initiate_login", async move {
			let mut state = HdfcLoginState::new(credentials);

			self.issue_token(&mut state).await?;
			self.validate_credentials(&mut state).await?;

			Ok(state)
		})
		.await
	}

	/// Runs the remaining steps and stores the access token under the API key.
	///
	/// A pending second factor without `otp` fails with [`PreconditionError::MissingOtp`] before
	/// any network call. On failure `state` keeps the last phase that succeeded.
	pub async fn complete_login(
		&self,
		state: &mut HdfcLoginState,
		otp: Option<&Secret>,
	) -> Result<AuthResult> {
		obs::observe(FlowKind::HdfcLogin, "complete_login", async move {
			if state.phase == HdfcPhase::CredentialsValidated && state.two_fa_enabled {
				state.phase = HdfcPhase::TwoFaPending;
			}
			if !matches!(
				state.phase,
				HdfcPhase::CredentialsValidated
					| HdfcPhase::TwoFaPending
					| HdfcPhase::TwoFaValidated
					| HdfcPhase::Authorized
			) {
				return Err(state.out_of_order(HdfcPhase::CredentialsValidated).into());
			}

			let otp = otp.filter(|otp| !otp.expose().trim().is_empty());

			if state.phase == HdfcPhase::TwoFaPending && otp.is_none() {
				return Err(PreconditionError::MissingOtp.into());
			}

			let _singleflight = self.ctx.guards.lock(BrokerKind::Hdfc, state.identity()).await;

			if let (HdfcPhase::TwoFaPending, Some(otp)) = (state.phase, otp) {
				self.validate_two_fa(state, otp).await?;
			}
			if matches!(state.phase, HdfcPhase::CredentialsValidated | HdfcPhase::TwoFaValidated) {
				self.authorise(state).await?;
			}

			self.issue_access_token(state).await
		})
		.await
	}

	// Step 1.
	async fn issue_token(&self, state: &mut HdfcLoginState) -> Result<()> {
		let url = self.endpoint("login", &[("api_key", state.identity())])?;
		let body: TokenIssued =
			common::call_step(&*self.ctx.http_client, ISSUE_TOKEN_STAGE, BrokerRequest::get(url))
				.await?;

		state.token_id = Some(body.token_id);
		state.phase = HdfcPhase::TokenIssued;

		Ok(())
	}

	// Step 2.
	async fn validate_credentials(&self, state: &mut HdfcLoginState) -> Result<()> {
		if state.phase != HdfcPhase::TokenIssued {
			return Err(state.out_of_order(HdfcPhase::TokenIssued).into());
		}

		let token_id = state.token_id(HdfcPhase::TokenIssued)?;
		let url =
			self.endpoint("login/validate", &[("api_key", state.identity()), ("token_id", token_id)])?;
		let payload = common::encode_body(
			VALIDATE_CREDENTIALS_STAGE,
			&ValidateCredentials {
				username: state.credentials.username(),
				password: state.credentials.password().expose(),
			},
		)?;
		let body: CredentialsValidated = common::call_step(
			&*self.ctx.http_client,
			VALIDATE_CREDENTIALS_STAGE,
			BrokerRequest::post(url).json(payload),
		)
		.await?;

		state.challenge = body.challenge();
		state.login_id = Some(body.login_id);
		state.two_fa_enabled = body.two_fa_enabled;
		state.phase = if body.two_fa_enabled {
			HdfcPhase::TwoFaPending
		} else {
			HdfcPhase::CredentialsValidated
		};

		Ok(())
	}

	// Step 3, only entered when a second factor is pending.
	async fn validate_two_fa(&self, state: &mut HdfcLoginState, otp: &Secret) -> Result<()> {
		let token_id = state.token_id(HdfcPhase::TwoFaPending)?;
		let url =
			self.endpoint("twofa/validate", &[("api_key", state.identity()), ("token_id", token_id)])?;
		let payload =
			common::encode_body(VALIDATE_TWO_FA_STAGE, &ValidateTwoFa { answer: otp.expose() })?;
		let body: RequestTokenIssued = common::call_step(
			&*self.ctx.http_client,
			VALIDATE_TWO_FA_STAGE,
			BrokerRequest::post(url).json(payload),
		)
		.await?;

		state.request_token = Some(Secret::new(body.request_token));
		state.phase = HdfcPhase::TwoFaValidated;

		Ok(())
	}

	// Step 4. Without a second factor there is no request token yet and the parameter is omitted.
	async fn authorise(&self, state: &mut HdfcLoginState) -> Result<()> {
		let url = {
			let token_id = state.token_id(HdfcPhase::CredentialsValidated)?;
			let mut params =
				vec![("api_key", state.identity()), ("token_id", token_id), ("consent", "true")];

			if let Some(request_token) = &state.request_token {
				params.push(("request_token", request_token.expose()));
			}

			self.endpoint("authorise", &params)?
		};
		let body: RequestTokenIssued =
			common::call_step(&*self.ctx.http_client, AUTHORISE_STAGE, BrokerRequest::get(url))
				.await?;

		state.request_token = Some(Secret::new(body.request_token));
		state.phase = HdfcPhase::Authorized;

		Ok(())
	}

	// Step 5.
	async fn issue_access_token(&self, state: &mut HdfcLoginState) -> Result<AuthResult> {
		let request_token = match (state.phase, &state.request_token) {
			(HdfcPhase::Authorized, Some(request_token)) => request_token.expose(),
			_ => return Err(state.out_of_order(HdfcPhase::Authorized).into()),
		};
		let url = self.endpoint(
			"access-token",
			&[("api_key", state.identity()), ("request_token", request_token)],
		)?;
		let payload = common::encode_body(
			ACCESS_TOKEN_STAGE,
			&IssueAccessToken { api_secret: state.credentials.api_secret().expose() },
		)?;
		let body: AccessTokenIssued = common::call_step(
			&*self.ctx.http_client,
			ACCESS_TOKEN_STAGE,
			BrokerRequest::post(url).json(payload),
		)
		.await?;

		self.ctx.sessions.set(state.identity(), ACCESS_TOKEN_FIELD, &body.access_token)?;

		state.phase = HdfcPhase::AccessGranted;

		Ok(AuthResult::new(body.access_token, None))
	}

	fn endpoint(&self, path: &'static str, params: &[(&str, &str)]) -> Result<Url> {
		let mut url = self.ctx.descriptor.endpoint(path)?;

		url.query_pairs_mut().extend_pairs(params);

		Ok(url)
	}
}
impl<C> Debug for HdfcAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HdfcAdapter").field("ctx", &self.ctx).finish()
	}
}
impl<C> BrokerAdapter for HdfcAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn kind(&self) -> BrokerKind {
		BrokerKind::Hdfc
	}

	fn initiate_login<'a>(&'a self, credentials: &'a JsonValue) -> BrokerFuture<'a, LoginInitiation> {
		Box::pin(async move {
			let credentials = parse_credentials::<HdfcCredentials>(credentials)?;
			let state = HdfcAdapter::initiate_login(self, credentials).await?;
			let message = if state.two_fa_enabled {
				"Second-factor code required to complete the login."
			} else {
				"Credentials accepted; complete the login to grant access."
			};

			Ok(LoginInitiation {
				login_url: None,
				challenge: state.challenge.clone(),
				session: LoginState::Hdfc(state),
				message: message.into(),
			})
		})
	}

	fn complete_login<'a>(
		&'a self,
		session: &'a mut LoginState,
		input: CompletionInput,
	) -> BrokerFuture<'a, AuthResult> {
		Box::pin(async move {
			let state = match session {
				LoginState::Hdfc(state) => state,
				other => return Err(other.mismatch(BrokerKind::Hdfc).into()),
			};

			HdfcAdapter::complete_login(self, state, input.otp.as_ref()).await
		})
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::ApiKey,
		error::RequestFailedError,
		http::HttpMethod,
		provider::BrokerDescriptor,
	};

	fn credentials() -> HdfcCredentials {
		HdfcCredentials::new(
			ApiKey::new("K").expect("API key fixture should be valid."),
			"user",
			"pass",
			"api-secret",
		)
		.expect("Credentials fixture should be valid.")
	}

	fn adapter(client: Arc<ScriptedHttpClient>) -> HdfcAdapter<ScriptedHttpClient> {
		let descriptor =
			BrokerDescriptor::production(BrokerKind::Hdfc).expect("HDFC should have a production API.");

		HdfcAdapter::new(FlowContext::new(client, test_session_store(), descriptor))
	}

	fn pending_state(two_fa_enabled: bool) -> HdfcLoginState {
		let mut state = HdfcLoginState::new(credentials());

		state.token_id = Some("T".into());
		state.login_id = Some("L".into());
		state.two_fa_enabled = two_fa_enabled;
		state.phase =
			if two_fa_enabled { HdfcPhase::TwoFaPending } else { HdfcPhase::CredentialsValidated };

		state
	}

	#[tokio::test]
	async fn initiation_reports_pending_second_factor() {
		let client = Arc::new(
			ScriptedHttpClient::default()
				.respond(200, serde_json::json!({ "tokenId": "T" }))
				.respond(
					200,
					serde_json::json!({
						"loginId": "L",
						"twoFAEnabled": true,
						"twofa": { "questions": [{ "question": "Enter OTP" }] }
					}),
				),
		);
		let state =
			adapter(client.clone()).initiate_login(credentials()).await.expect("Initiation should succeed.");

		assert_eq!(state.phase, HdfcPhase::TwoFaPending);
		assert_eq!(state.token_id.as_deref(), Some("T"));
		assert_eq!(state.login_id.as_deref(), Some("L"));
		assert_eq!(state.challenge.as_deref(), Some("Enter OTP"));
		assert_eq!(
			client.calls(),
			vec![
				(HttpMethod::Get, "/oapi/v1/login".to_owned()),
				(HttpMethod::Post, "/oapi/v1/login/validate".to_owned())
			]
		);

		let requests = client.requests();

		assert_eq!(requests[0].url.query(), Some("api_key=K"));
		assert_eq!(requests[1].url.query(), Some("api_key=K&token_id=T"));
		assert_eq!(requests[1].json, Some(serde_json::json!({ "username": "user", "password": "pass" })));
	}

	#[tokio::test]
	async fn step_two_without_two_fa_flag_is_an_unexpected_response() {
		let client = Arc::new(
			ScriptedHttpClient::default()
				.respond(200, serde_json::json!({ "tokenId": "T" }))
				.respond(200, serde_json::json!({ "loginId": "L" })),
		);
		let err = adapter(client)
			.initiate_login(credentials())
			.await
			.expect_err("Missing twoFAEnabled should fail.");

		assert!(matches!(
			err,
			Error::RequestFailed(RequestFailedError::UnexpectedResponse {
				stage: "validate_credentials",
				..
			})
		));
	}

	#[tokio::test]
	async fn failed_step_leaves_state_resumable() {
		let client = Arc::new(
			ScriptedHttpClient::default()
				.respond(200, serde_json::json!({ "requestToken": "R1" }))
				.respond(503, serde_json::json!({ "message": "Maintenance" }))
				.respond(200, serde_json::json!({ "requestToken": "R2" }))
				.respond(200, serde_json::json!({ "accessToken": "final" })),
		);
		let adapter = adapter(client.clone());
		let mut state = pending_state(true);
		let otp = Secret::new("123456");
		let err = adapter
			.complete_login(&mut state, Some(&otp))
			.await
			.expect_err("Step 4 outage should fail.");

		assert_eq!(err.upstream_status(), Some(503));
		assert_eq!(state.phase, HdfcPhase::TwoFaValidated);

		let result = adapter
			.complete_login(&mut state, None)
			.await
			.expect("Resuming after step 3 should not need the OTP again.");

		assert_eq!(result.access_token.expose(), "final");
		assert_eq!(state.phase, HdfcPhase::AccessGranted);
		assert_eq!(
			client.paths(),
			vec![
				"/oapi/v1/twofa/validate",
				"/oapi/v1/authorise",
				"/oapi/v1/authorise",
				"/oapi/v1/access-token"
			]
		);
	}

	#[tokio::test]
	async fn blank_otp_counts_as_missing() {
		let client = Arc::new(ScriptedHttpClient::default());
		let mut state = pending_state(true);
		let err = adapter(client.clone())
			.complete_login(&mut state, Some(&Secret::new("  ")))
			.await
			.expect_err("Blank OTP should fail.");

		assert!(matches!(err, Error::Precondition(PreconditionError::MissingOtp)));
		assert!(client.calls().is_empty());
	}

	#[tokio::test]
	async fn completion_before_step_two_is_out_of_order() {
		let client = Arc::new(ScriptedHttpClient::default());
		let mut state = HdfcLoginState::new(credentials());
		let err = adapter(client.clone())
			.complete_login(&mut state, None)
			.await
			.expect_err("A fresh state cannot complete.");

		assert!(matches!(
			err,
			Error::Precondition(PreconditionError::OutOfOrder {
				expected: "credentials_validated",
				actual: "init"
			})
		));
		assert!(client.calls().is_empty());
	}
}
