//! Uniform broker capability surface.
//!
//! Every broker variant implements [`BrokerAdapter`]: two mandatory login operations plus
//! optional extensions that default to [`Error::Unsupported`]. Callers pick an adapter by name
//! through [`AdapterFactory`] and thread the opaque [`LoginState`] between the two login calls.
//! Completion updates that state in place, so a caller keeps whatever progress a failed attempt
//! made.

pub mod factory;
pub mod mock;

pub use factory::*;
pub use mock::*;

pub use crate::provider::BrokerKind;

// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::ValidationError,
	flows::{FyersLoginState, HdfcLoginState, HdfcPhase, RedirectParams},
};

/// Future returned by [`BrokerAdapter`] operations.
pub type BrokerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Capability set shared by every broker variant.
pub trait BrokerAdapter
where
	Self: Send + Sync,
{
	/// Broker variant served by the adapter.
	fn kind(&self) -> BrokerKind;

	/// Validates `credentials` and starts a login.
	fn initiate_login<'a>(&'a self, credentials: &'a JsonValue) -> BrokerFuture<'a, LoginInitiation>;

	/// Finishes a login started by [`BrokerAdapter::initiate_login`].
	///
	/// `session` advances in place. After a failure it records the last step that succeeded, so
	/// passing it back resumes from there instead of repeating spent steps.
	fn complete_login<'a>(
		&'a self,
		session: &'a mut LoginState,
		input: CompletionInput,
	) -> BrokerFuture<'a, AuthResult>;

	/// Exchanges the stored refresh token for a new access token.
	fn refresh<'a>(&'a self, session: &'a LoginState, pin: &'a Secret) -> BrokerFuture<'a, AuthResult> {
		let _ = (session, pin);

		unsupported(self.kind(), "refresh")
	}

	/// Probes whether the stored access token is still accepted.
	fn session_status<'a>(&'a self, session: &'a LoginState) -> BrokerFuture<'a, SessionStatus> {
		let _ = session;

		unsupported(self.kind(), "session_status")
	}
}

fn unsupported<'a, T>(kind: BrokerKind, operation: &'static str) -> BrokerFuture<'a, T>
where
	T: 'a + Send,
{
	Box::pin(async move { Err(Error::Unsupported { broker: kind.as_str(), operation }) })
}

/// Opaque login handle returned to the caller and passed back on completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "broker", rename_all = "snake_case")]
pub enum LoginState {
	/// OAuth-style login state.
	Fyers(FyersLoginState),
	/// Five-step login state.
	Hdfc(HdfcLoginState),
	/// Canned mock session.
	Mock(MockLoginState),
}
impl LoginState {
	/// Broker that issued the state.
	pub fn kind(&self) -> BrokerKind {
		match self {
			LoginState::Fyers(_) => BrokerKind::Fyers,
			LoginState::Hdfc(_) => BrokerKind::Hdfc,
			LoginState::Mock(_) => BrokerKind::Mock,
		}
	}

	/// Returns `true` when completion needs a one-time second-factor code.
	///
	/// Callers should prompt from this rather than from [`LoginInitiation::challenge`], which is
	/// only the broker's optional question text.
	pub fn awaits_otp(&self) -> bool {
		match self {
			LoginState::Hdfc(state) =>
				state.phase == HdfcPhase::TwoFaPending
					|| (state.phase == HdfcPhase::CredentialsValidated && state.two_fa_enabled),
			LoginState::Fyers(_) | LoginState::Mock(_) => false,
		}
	}

	pub(crate) fn mismatch(&self, expected: BrokerKind) -> ValidationError {
		ValidationError::SessionMismatch { expected: expected.as_str(), found: self.kind().as_str() }
	}
}

/// Result of [`BrokerAdapter::initiate_login`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInitiation {
	/// Browser URL to visit, for redirect-based brokers.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub login_url: Option<Url>,
	/// Handle to pass back to [`BrokerAdapter::complete_login`].
	pub session: LoginState,
	/// Second-factor prompt (e.g. the OTP question) when one is pending.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub challenge: Option<String>,
	/// Human-readable status line.
	pub message: String,
}

/// Out-of-band input collected between the two login calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionInput {
	/// Authorization code from the redirect.
	pub auth_code: Option<String>,
	/// State echoed back by the redirect.
	pub state: Option<String>,
	/// One-time second-factor code.
	pub otp: Option<Secret>,
}
impl CompletionInput {
	/// Input for redirect-based brokers.
	pub fn redirect(auth_code: impl Into<String>, state: impl Into<String>) -> Self {
		Self { auth_code: Some(auth_code.into()), state: Some(state.into()), otp: None }
	}

	/// Input for brokers that ask for a one-time code.
	pub fn otp(otp: impl Into<Secret>) -> Self {
		Self { otp: Some(otp.into()), ..Default::default() }
	}

	/// Extracts `auth_code` and `state` from the URL the broker redirected to.
	pub fn from_redirect_url(redirect_url: &str) -> Result<Self, ValidationError> {
		let RedirectParams { auth_code, state } = RedirectParams::parse(redirect_url)?;

		Ok(Self::redirect(auth_code, state))
	}
}

/// Terminal output of a successful login or refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
	/// Access token for later trading calls.
	pub access_token: Secret,
	/// Refresh token, when the broker issues one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<Secret>,
	/// Local time the token was received.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
}
impl AuthResult {
	pub(crate) fn new(access_token: impl Into<Secret>, refresh_token: Option<Secret>) -> Self {
		Self { access_token: access_token.into(), refresh_token, issued_at: OffsetDateTime::now_utc() }
	}
}

/// Outcome of a liveness probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
	/// The broker accepted the stored access token.
	Active,
	/// The session cannot be used.
	Inactive {
		/// Why the probe concluded the session is unusable.
		reason: InactiveReason,
	},
}
impl SessionStatus {
	/// Returns `true` for [`SessionStatus::Active`].
	pub fn is_active(&self) -> bool {
		matches!(self, SessionStatus::Active)
	}
}

/// Non-secret explanation attached to an inactive session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveReason {
	/// No access token is stored; no broker call was made.
	NoAccessToken,
	/// Broker answered but refused the token.
	Rejected,
	/// Broker could not be reached.
	Unreachable,
	/// Broker answered with a body the probe could not interpret.
	UnexpectedResponse,
}
impl InactiveReason {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			InactiveReason::NoAccessToken => "no_access_token",
			InactiveReason::Rejected => "rejected",
			InactiveReason::Unreachable => "unreachable",
			InactiveReason::UnexpectedResponse => "unexpected_response",
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_state_is_tagged_by_broker() {
		let state = LoginState::Mock(MockLoginState::default());
		let value = serde_json::to_value(&state).expect("Login state should serialize.");

		assert_eq!(value.get("broker"), Some(&JsonValue::from("mock")));
		assert_eq!(
			serde_json::from_value::<LoginState>(value).expect("Login state should deserialize."),
			state
		);
	}

	#[test]
	fn pending_second_factor_is_read_from_the_phase() {
		let hdfc = |phase, two_fa_enabled| {
			LoginState::Hdfc(HdfcLoginState {
				credentials: crate::auth::HdfcCredentials::new(
					crate::auth::ApiKey::new("K").expect("API key fixture should be valid."),
					"user",
					"pass",
					"api-secret",
				)
				.expect("Credentials fixture should be valid."),
				token_id: Some("T".into()),
				login_id: Some("L".into()),
				two_fa_enabled,
				// The broker may demand a code without any question text.
				challenge: None,
				request_token: None,
				phase,
			})
		};

		assert!(hdfc(HdfcPhase::TwoFaPending, true).awaits_otp());
		assert!(hdfc(HdfcPhase::CredentialsValidated, true).awaits_otp());
		assert!(!hdfc(HdfcPhase::CredentialsValidated, false).awaits_otp());
		assert!(!hdfc(HdfcPhase::TwoFaValidated, true).awaits_otp());
		assert!(!LoginState::Mock(MockLoginState::default()).awaits_otp());
	}

	#[test]
	fn inactive_status_serializes_with_reason() {
		let value = serde_json::to_value(SessionStatus::Inactive {
			reason: InactiveReason::Unreachable,
		})
		.expect("Status should serialize.");

		assert_eq!(value, serde_json::json!({ "status": "inactive", "reason": "unreachable" }));
	}

	#[test]
	fn completion_input_reads_redirect_urls() {
		let input = CompletionInput::from_redirect_url("http://cb/?auth_code=code1&state=N")
			.expect("Redirect URL should parse.");

		assert_eq!(input, CompletionInput::redirect("code1", "N"));
	}

	#[test]
	fn auth_result_debug_redacts_tokens() {
		let result = AuthResult::new("tok", Some(Secret::new("rtok")));
		let rendered = format!("{result:?}");

		assert!(!rendered.contains("tok\""));
		assert!(!rendered.contains("rtok"));
	}
}
