//! Deterministic offline adapter.

// self
use crate::{
	_prelude::*,
	auth::Secret,
	broker::{
		AuthResult, BrokerAdapter, BrokerFuture, BrokerKind, CompletionInput, LoginInitiation,
		LoginState, SessionStatus,
	},
};

/// Session identifier handed out by [`MockAdapter::initiate_login`](BrokerAdapter::initiate_login).
pub const MOCK_SESSION_ID: &str = "mock_session_123";
/// Access token handed out by the mock completion and refresh calls.
pub const MOCK_ACCESS_TOKEN: &str = "mock_access_token";

/// Login state issued by [`MockAdapter`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockLoginState {
	/// Canned session identifier.
	pub session_id: String,
}
impl Default for MockLoginState {
	fn default() -> Self {
		Self { session_id: MOCK_SESSION_ID.into() }
	}
}

/// Adapter that returns canned success data without any network or session-store I/O.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockAdapter;
impl BrokerAdapter for MockAdapter {
	fn kind(&self) -> BrokerKind {
		BrokerKind::Mock
	}

	fn initiate_login<'a>(&'a self, credentials: &'a JsonValue) -> BrokerFuture<'a, LoginInitiation> {
		let _ = credentials;

		Box::pin(async move {
			Ok(LoginInitiation {
				login_url: None,
				session: LoginState::Mock(MockLoginState::default()),
				challenge: None,
				message: "Mock login initiated.".into(),
			})
		})
	}

	fn complete_login<'a>(
		&'a self,
		session: &'a mut LoginState,
		input: CompletionInput,
	) -> BrokerFuture<'a, AuthResult> {
		let _ = input;

		Box::pin(async move {
			match session {
				LoginState::Mock(_) => Ok(AuthResult::new(MOCK_ACCESS_TOKEN, None)),
				other => Err(other.mismatch(BrokerKind::Mock).into()),
			}
		})
	}

	fn refresh<'a>(&'a self, session: &'a LoginState, pin: &'a Secret) -> BrokerFuture<'a, AuthResult> {
		let _ = pin;

		Box::pin(async move {
			match session {
				LoginState::Mock(_) => Ok(AuthResult::new(MOCK_ACCESS_TOKEN, None)),
				other => Err(other.mismatch(BrokerKind::Mock).into()),
			}
		})
	}

	fn session_status<'a>(&'a self, session: &'a LoginState) -> BrokerFuture<'a, SessionStatus> {
		Box::pin(async move {
			match session {
				LoginState::Mock(_) => Ok(SessionStatus::Active),
				other => Err(other.mismatch(BrokerKind::Mock).into()),
			}
		})
	}
}
