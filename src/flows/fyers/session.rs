// crates.io
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::FyersCredentials,
	error::{ConfigError, PreconditionError, ValidationError},
	provider::BrokerDescriptor,
};

const STATE_LEN: usize = 32;

/// Named states of the OAuth-style login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FyersPhase {
	/// Credentials accepted, nothing issued yet.
	Init,
	/// Nonce stored and login URL handed to the caller.
	AuthCodeRequested,
	/// Returned state matched the stored nonce.
	StateValidated,
	/// Auth code exchanged for tokens.
	TokenExchanged,
}
impl FyersPhase {
	/// Returns a stable label for diagnostics.
	pub const fn as_str(self) -> &'static str {
		match self {
			FyersPhase::Init => "init",
			FyersPhase::AuthCodeRequested => "auth_code_requested",
			FyersPhase::StateValidated => "state_validated",
			FyersPhase::TokenExchanged => "token_exchanged",
		}
	}
}

/// Caller-held handle threaded between `initiate_login` and `complete_login`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FyersLoginState {
	/// Credentials the login was started with.
	pub credentials: FyersCredentials,
	/// State nonce embedded in the login URL.
	#[serde(rename = "state")]
	pub nonce: String,
	/// Current protocol position.
	pub phase: FyersPhase,
}
impl FyersLoginState {
	pub(super) fn new(credentials: FyersCredentials) -> Self {
		Self { credentials, nonce: random_state(), phase: FyersPhase::Init }
	}

	/// Broker-app identity that namespaces the session records.
	pub fn identity(&self) -> &str {
		self.credentials.app_id()
	}

	pub(super) fn ensure_phase(&self, expected: FyersPhase) -> Result<(), PreconditionError> {
		if self.phase == expected {
			Ok(())
		} else {
			Err(PreconditionError::OutOfOrder {
				expected: expected.as_str(),
				actual: self.phase.as_str(),
			})
		}
	}
}

/// `auth_code` and `state` extracted from the broker redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectParams {
	/// Authorization code to exchange.
	pub auth_code: String,
	/// State echoed back by the broker.
	pub state: String,
}
impl RedirectParams {
	/// Parses the full redirect URL the browser landed on.
	pub fn parse(redirect_url: &str) -> Result<Self, ValidationError> {
		let url = Url::parse(redirect_url.trim())
			.map_err(|e| ValidationError::InvalidRedirect { reason: e.to_string() })?;
		let mut auth_code = None;
		let mut state = None;

		for (name, value) in url.query_pairs() {
			match name.as_ref() {
				"auth_code" => auth_code = Some(value.into_owned()),
				"state" => state = Some(value.into_owned()),
				_ => {},
			}
		}

		let auth_code = auth_code.filter(|v| !v.is_empty()).ok_or_else(|| {
			ValidationError::InvalidRedirect { reason: "missing `auth_code` parameter".into() }
		})?;
		let state = state.filter(|v| !v.is_empty()).ok_or_else(|| {
			ValidationError::InvalidRedirect { reason: "missing `state` parameter".into() }
		})?;

		Ok(Self { auth_code, state })
	}
}

/// Lowercase hex SHA-256 of `app_id` immediately followed by `secret_id`.
pub fn app_id_hash(credentials: &FyersCredentials) -> String {
	let mut hasher = Sha256::new();

	hasher.update(credentials.app_id().as_bytes());
	hasher.update(credentials.secret_id().expose().as_bytes());

	hasher.finalize().iter().map(|byte| format!("{byte:02x}")).collect()
}

pub(super) fn build_login_url(
	descriptor: &BrokerDescriptor,
	state: &FyersLoginState,
) -> Result<Url, ConfigError> {
	let mut url = descriptor.endpoint("generate-authcode")?;
	let query = format!(
		"client_id={}&redirect_uri={}&response_type=code&state={}",
		form_encode(state.credentials.app_id()),
		escape_redirect_uri(state.credentials.redirect_uri()),
		form_encode(&state.nonce),
	);

	url.set_query(Some(&query));

	Ok(url)
}

fn form_encode(value: &str) -> String {
	url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

// The broker expects the redirect URI verbatim, so only query delimiters are escaped.
fn escape_redirect_uri(redirect_uri: &Url) -> String {
	let mut escaped = String::with_capacity(redirect_uri.as_str().len());

	for ch in redirect_uri.as_str().chars() {
		match ch {
			'%' => escaped.push_str("%25"),
			'&' => escaped.push_str("%26"),
			'+' => escaped.push_str("%2B"),
			'#' => escaped.push_str("%23"),
			_ => escaped.push(ch),
		}
	}

	escaped
}

fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}
