// self
use crate::{
	_prelude::*,
	auth::{HdfcCredentials, Secret},
	error::PreconditionError,
};

/// Named states of the five-step login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HdfcPhase {
	/// Credentials accepted, nothing issued yet.
	Init,
	/// Step 1 issued a transient login token.
	TokenIssued,
	/// Step 2 accepted the username/password and no second factor is required.
	CredentialsValidated,
	/// Step 2 accepted the username/password and a second factor is required.
	TwoFaPending,
	/// Step 3 accepted the one-time code.
	TwoFaValidated,
	/// Step 4 recorded consent.
	Authorized,
	/// Step 5 issued the access token.
	AccessGranted,
}
impl HdfcPhase {
	/// Returns a stable label for diagnostics.
	pub const fn as_str(self) -> &'static str {
		match self {
			HdfcPhase::Init => "init",
			HdfcPhase::TokenIssued => "token_issued",
			HdfcPhase::CredentialsValidated => "credentials_validated",
			HdfcPhase::TwoFaPending => "two_fa_pending",
			HdfcPhase::TwoFaValidated => "two_fa_validated",
			HdfcPhase::Authorized => "authorized",
			HdfcPhase::AccessGranted => "access_granted",
		}
	}
}

/// Caller-held handle carrying everything needed to resume the flow cold.
///
/// A failed `complete_login` leaves the state at the last step that succeeded, so retrying with
/// the same handle resumes from there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HdfcLoginState {
	/// Credentials the login was started with.
	pub credentials: HdfcCredentials,
	/// Transient login token from step 1.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_id: Option<String>,
	/// Login identifier from step 2.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub login_id: Option<String>,
	/// Whether step 2 demanded a second factor.
	#[serde(rename = "twoFAEnabled", default)]
	pub two_fa_enabled: bool,
	/// Second-factor prompt from step 2.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub challenge: Option<String>,
	/// Latest request token in the step 3/4 chain.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_token: Option<Secret>,
	/// Current protocol position.
	pub phase: HdfcPhase,
}
impl HdfcLoginState {
	pub(super) fn new(credentials: HdfcCredentials) -> Self {
		Self {
			credentials,
			token_id: None,
			login_id: None,
			two_fa_enabled: false,
			challenge: None,
			request_token: None,
			phase: HdfcPhase::Init,
		}
	}

	/// Broker-app identity that namespaces the session records.
	pub fn identity(&self) -> &str {
		self.credentials.api_key()
	}

	pub(super) fn token_id(&self, expected: HdfcPhase) -> Result<&str, PreconditionError> {
		self.token_id.as_deref().ok_or_else(|| self.out_of_order(expected))
	}

	pub(super) fn out_of_order(&self, expected: HdfcPhase) -> PreconditionError {
		PreconditionError::OutOfOrder { expected: expected.as_str(), actual: self.phase.as_str() }
	}
}

// Step 1: GET /login?api_key
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TokenIssued {
	pub(super) token_id: String,
}

// Step 2: POST /login/validate?api_key&token_id
#[derive(Serialize)]
pub(super) struct ValidateCredentials<'a> {
	pub(super) username: &'a str,
	pub(super) password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CredentialsValidated {
	pub(super) login_id: String,
	#[serde(rename = "twoFAEnabled")]
	pub(super) two_fa_enabled: bool,
	#[serde(default)]
	pub(super) twofa: Option<TwoFaDescriptor>,
}
impl CredentialsValidated {
	pub(super) fn challenge(&self) -> Option<String> {
		self.twofa.as_ref()?.questions.iter().map(|q| q.question.clone()).next()
	}
}

#[derive(Default, Deserialize)]
pub(super) struct TwoFaDescriptor {
	#[serde(default)]
	pub(super) questions: Vec<TwoFaQuestion>,
}

#[derive(Deserialize)]
pub(super) struct TwoFaQuestion {
	pub(super) question: String,
}

// Step 3: POST /twofa/validate?api_key&token_id
#[derive(Serialize)]
pub(super) struct ValidateTwoFa<'a> {
	pub(super) answer: &'a str,
}

// Steps 3 and 4 both answer with a request token.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RequestTokenIssued {
	pub(super) request_token: String,
}

// Step 5: POST /access-token?api_key&request_token
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IssueAccessToken<'a> {
	pub(super) api_secret: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AccessTokenIssued {
	pub(super) access_token: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::ApiKey;

	#[test]
	fn challenge_comes_from_the_first_question() {
		let body: CredentialsValidated = serde_json::from_value(serde_json::json!({
			"recaptcha": false,
			"loginId": "L",
			"twoFAEnabled": true,
			"twofa": { "questions": [{ "question": "Enter OTP" }, { "question": "PIN" }] }
		}))
		.expect("Step 2 body should parse.");

		assert!(body.two_fa_enabled);
		assert_eq!(body.challenge().as_deref(), Some("Enter OTP"));
	}

	#[test]
	fn empty_twofa_object_has_no_challenge() {
		let body: CredentialsValidated = serde_json::from_value(
			serde_json::json!({ "loginId": "L", "twoFAEnabled": false, "twofa": {} }),
		)
		.expect("Step 2 body should parse.");

		assert_eq!(body.challenge(), None);
	}

	#[test]
	fn state_round_trips_with_broker_field_names() {
		let credentials = HdfcCredentials::new(
			ApiKey::new("K").expect("API key fixture should be valid."),
			"user",
			"pass",
			"api-secret",
		)
		.expect("Credentials fixture should be valid.");
		let mut state = HdfcLoginState::new(credentials);

		state.token_id = Some("T".into());
		state.two_fa_enabled = true;
		state.phase = HdfcPhase::TwoFaPending;

		let value = serde_json::to_value(&state).expect("State should serialize.");

		assert_eq!(value.get("tokenId"), Some(&JsonValue::from("T")));
		assert_eq!(value.get("twoFAEnabled"), Some(&JsonValue::from(true)));
		assert_eq!(value.get("phase"), Some(&JsonValue::from("two_fa_pending")));
		assert_eq!(
			serde_json::from_value::<HdfcLoginState>(value).expect("State should deserialize."),
			state
		);
	}
}
