//! OAuth-style login for Fyers API v3.
//!
//! `initiate_login` stores a random state nonce under the app identity and returns the
//! `generate-authcode` URL. `complete_login` compares the echoed state with the stored nonce
//! before any network call, then exchanges the auth code for tokens. `refresh` and
//! `session_status` reuse the stored tokens.

mod session;

pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::{FyersCredentials, Secret, parse_credentials},
	broker::{
		AuthResult, BrokerAdapter, BrokerFuture, BrokerKind, CompletionInput, InactiveReason,
		LoginInitiation, LoginState, SessionStatus,
	},
	error::{PreconditionError, ValidationError},
	flows::{FlowContext, common},
	http::{BrokerHttpClient, BrokerRequest, BrokerResponse},
	obs::{self, FlowKind},
	session::{ACCESS_TOKEN_FIELD, REFRESH_TOKEN_FIELD, STATE_FIELD},
};

const AUTH_CODE_STAGE: &str = "validate_auth_code";
const REFRESH_STAGE: &str = "refresh_token";
const PROFILE_STAGE: &str = "profile";

/// Fyers login flow bound to one transport and session store.
pub struct FyersAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	ctx: FlowContext<C>,
}
impl<C> FyersAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Wraps a flow context whose descriptor points at the Fyers API.
	pub fn new(ctx: FlowContext<C>) -> Self {
		Self { ctx }
	}

	/// Stores a fresh state nonce and builds the browser login URL.
	pub async fn initiate_login(
		&self,
		credentials: FyersCredentials,
	) -> Result<(Url, FyersLoginState)> {
		obs::observe(FlowKind::FyersLogin, "initiate_login", async move {
			let mut state = FyersLoginState::new(credentials);

			self.ctx.sessions.set(state.identity(), STATE_FIELD, &state.nonce)?;

			let login_url = build_login_url(&self.ctx.descriptor, &state)?;

			state.phase = FyersPhase::AuthCodeRequested;

			Ok((login_url, state))
		})
		.await
	}

	/// Verifies the echoed state and exchanges `auth_code` for tokens.
	///
	/// A state mismatch fails with [`Error::Csrf`] without contacting the broker. On success the
	/// access token (and refresh token, when issued) are stored under the app identity, the
	/// stored nonce is discarded so the redirect cannot be replayed, and `state` advances to
	/// [`FyersPhase::TokenExchanged`]. A failed exchange leaves the nonce in place so the caller
	/// can retry with a fresh auth code.
	pub async fn complete_login(
		&self,
		state: &mut FyersLoginState,
		auth_code: &str,
		returned_state: &str,
	) -> Result<AuthResult> {
		obs::observe(FlowKind::FyersLogin, "complete_login", async move {
			if state.phase != FyersPhase::StateValidated {
				state.ensure_phase(FyersPhase::AuthCodeRequested)?;
			}
			if auth_code.trim().is_empty() {
				return Err(ValidationError::EmptyField { field: "auth_code" }.into());
			}

			let _singleflight = self.ctx.guards.lock(BrokerKind::Fyers, state.identity()).await;
			let stored = self.ctx.sessions.get(state.identity(), STATE_FIELD)?;

			if stored.as_deref() != Some(returned_state) {
				return Err(Error::Csrf { identity: state.identity().to_owned() });
			}

			state.phase = FyersPhase::StateValidated;

			let body = common::encode_body(
				AUTH_CODE_STAGE,
				&ValidateAuthCode {
					grant_type: "authorization_code",
					app_id_hash: app_id_hash(&state.credentials),
					code: auth_code,
				},
			)?;
			let request =
				BrokerRequest::post(self.ctx.descriptor.endpoint("validate-authcode")?).json(body);
			let tokens: IssuedTokens = self.call(AUTH_CODE_STAGE, request).await?;

			self.ctx.sessions.set(state.identity(), ACCESS_TOKEN_FIELD, &tokens.access_token)?;

			if let Some(refresh_token) = &tokens.refresh_token {
				self.ctx.sessions.set(state.identity(), REFRESH_TOKEN_FIELD, refresh_token)?;
			}

			self.ctx.sessions.remove(state.identity(), STATE_FIELD);

			state.phase = FyersPhase::TokenExchanged;

			Ok(tokens.into_result())
		})
		.await
	}

	/// Exchanges the stored refresh token plus the account PIN for a new access token.
	pub async fn refresh(&self, state: &FyersLoginState, pin: &Secret) -> Result<AuthResult> {
		obs::observe(FlowKind::FyersRefresh, "refresh", async move {
			if pin.expose().trim().is_empty() {
				return Err(ValidationError::EmptyField { field: "pin" }.into());
			}

			let _singleflight = self.ctx.guards.lock(BrokerKind::Fyers, state.identity()).await;
			let refresh_token = self
				.ctx
				.sessions
				.get(state.identity(), REFRESH_TOKEN_FIELD)?
				.ok_or_else(|| PreconditionError::MissingRefreshToken {
					identity: state.identity().to_owned(),
				})?;
			let body = common::encode_body(
				REFRESH_STAGE,
				&ValidateRefreshToken {
					grant_type: "refresh_token",
					app_id_hash: app_id_hash(&state.credentials),
					refresh_token: &refresh_token,
					pin: pin.expose(),
				},
			)?;
			let request = BrokerRequest::post(self.ctx.descriptor.endpoint("validate-refresh-token")?)
				.json(body);
			let tokens: IssuedTokens = self.call(REFRESH_STAGE, request).await?;

			self.ctx.sessions.set(state.identity(), ACCESS_TOKEN_FIELD, &tokens.access_token)?;

			if let Some(rotated) = &tokens.refresh_token {
				self.ctx.sessions.set(state.identity(), REFRESH_TOKEN_FIELD, rotated)?;
			}

			Ok(tokens.into_result())
		})
		.await
	}

	/// Probes the profile endpoint with the stored access token.
	///
	/// Missing tokens short-circuit without a network call. Broker and transport failures are
	/// reported as [`SessionStatus::Inactive`] with a reason; only session-store integrity
	/// failures propagate.
	pub async fn session_status(&self, state: &FyersLoginState) -> Result<SessionStatus> {
		obs::observe(FlowKind::SessionStatus, "session_status", async move {
			let Some(access_token) = self.ctx.sessions.get(state.identity(), ACCESS_TOKEN_FIELD)?
			else {
				return Ok(inactive(InactiveReason::NoAccessToken, None));
			};
			let request = BrokerRequest::get(self.ctx.descriptor.endpoint("profile")?)
				.header("authorization", format!("{}:{access_token}", state.identity()));
			let response = match common::send_step(&*self.ctx.http_client, PROFILE_STAGE, request).await
			{
				Ok(response) => response,
				Err(Error::BrokerApi { status, .. }) =>
					return Ok(inactive(InactiveReason::Rejected, Some(status))),
				Err(_) => return Ok(inactive(InactiveReason::Unreachable, None)),
			};

			match common::decode_body::<FyersEnvelope>(PROFILE_STAGE, &response) {
				Ok(envelope) if envelope.s.as_deref() == Some("ok") => Ok(SessionStatus::Active),
				Ok(_) => Ok(inactive(InactiveReason::Rejected, Some(response.status))),
				Err(_) => Ok(inactive(InactiveReason::UnexpectedResponse, Some(response.status))),
			}
		})
		.await
	}

	async fn call<T>(&self, stage: &'static str, request: BrokerRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = common::send_step(&*self.ctx.http_client, stage, request).await?;

		reject_error_envelope(stage, &response)?;

		common::decode_body(stage, &response)
	}
}
impl<C> Debug for FyersAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FyersAdapter").field("ctx", &self.ctx).finish()
	}
}
impl<C> BrokerAdapter for FyersAdapter<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn kind(&self) -> BrokerKind {
		BrokerKind::Fyers
	}

	fn initiate_login<'a>(&'a self, credentials: &'a JsonValue) -> BrokerFuture<'a, LoginInitiation> {
		Box::pin(async move {
			let credentials = parse_credentials::<FyersCredentials>(credentials)?;
			let (login_url, state) = FyersAdapter::initiate_login(self, credentials).await?;

			Ok(LoginInitiation {
				login_url: Some(login_url),
				session: LoginState::Fyers(state),
				challenge: None,
				message: "Open the login URL and complete the broker sign-in.".into(),
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
				LoginState::Fyers(state) => state,
				other => return Err(other.mismatch(BrokerKind::Fyers).into()),
			};
			let auth_code =
				input.auth_code.ok_or(ValidationError::EmptyField { field: "auth_code" })?;
			let returned_state = input.state.ok_or(ValidationError::EmptyField { field: "state" })?;

			FyersAdapter::complete_login(self, state, &auth_code, &returned_state).await
		})
	}

	fn refresh<'a>(&'a self, session: &'a LoginState, pin: &'a Secret) -> BrokerFuture<'a, AuthResult> {
		Box::pin(async move {
			match session {
				LoginState::Fyers(state) => FyersAdapter::refresh(self, state, pin).await,
				other => Err(other.mismatch(BrokerKind::Fyers).into()),
			}
		})
	}

	fn session_status<'a>(&'a self, session: &'a LoginState) -> BrokerFuture<'a, SessionStatus> {
		Box::pin(async move {
			match session {
				LoginState::Fyers(state) => FyersAdapter::session_status(self, state).await,
				other => Err(other.mismatch(BrokerKind::Fyers).into()),
			}
		})
	}
}

#[derive(Serialize)]
struct ValidateAuthCode<'a> {
	grant_type: &'static str,
	#[serde(rename = "appIdHash")]
	app_id_hash: String,
	code: &'a str,
}

#[derive(Serialize)]
struct ValidateRefreshToken<'a> {
	grant_type: &'static str,
	#[serde(rename = "appIdHash")]
	app_id_hash: String,
	refresh_token: &'a str,
	pin: &'a str,
}

#[derive(Deserialize)]
struct IssuedTokens {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}
impl IssuedTokens {
	fn into_result(self) -> AuthResult {
		AuthResult::new(self.access_token, self.refresh_token.map(Secret::new))
	}
}

/// Status envelope Fyers wraps around every response (`"s": "ok" | "error"`).
#[derive(Deserialize)]
struct FyersEnvelope {
	#[serde(default)]
	s: Option<String>,
}

/// Fyers reports some failures as HTTP 200 with `"s": "error"`.
fn reject_error_envelope(stage: &'static str, response: &BrokerResponse) -> Result<()> {
	let envelope = serde_json::from_slice::<FyersEnvelope>(&response.body).ok();

	match envelope.and_then(|envelope| envelope.s) {
		Some(s) if s == "error" =>
			Err(Error::BrokerApi { stage, status: response.status, body: response.body_text() }),
		_ => Ok(()),
	}
}

fn inactive(reason: InactiveReason, status: Option<u16>) -> SessionStatus {
	obs::record_probe_swallowed(reason.as_str(), status);

	SessionStatus::Inactive { reason }
}
