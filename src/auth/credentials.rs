//! Per-broker credential records validated at construction time.
//!
//! Credentials arrive as loosely typed JSON at the caller boundary. Each broker parses them
//! into an immutable record with [`parse_credentials`], which reports the offending field
//! path without echoing the rejected value.

// self
use crate::{
	_prelude::*,
	auth::{ApiKey, AppId, Secret},
	error::ValidationError,
};

/// Credentials for the OAuth-style (Fyers) login flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFyersCredentials")]
pub struct FyersCredentials {
	app_id: AppId,
	secret_id: Secret,
	redirect_uri: Url,
}
impl FyersCredentials {
	/// Builds a validated credential record.
	pub fn new(
		app_id: AppId,
		secret_id: impl Into<Secret>,
		redirect_uri: Url,
	) -> Result<Self, ValidationError> {
		let secret_id = secret_id.into();

		require_secret("secret_id", &secret_id)?;

		if !matches!(redirect_uri.scheme(), "http" | "https") {
			return Err(ValidationError::InvalidField {
				field: "redirect_uri",
				reason: "must be an http(s) URL",
			});
		}

		Ok(Self { app_id, secret_id, redirect_uri })
	}

	/// Broker-app identity used to namespace session records.
	pub fn app_id(&self) -> &AppId {
		&self.app_id
	}

	/// App secret paired with the app id.
	pub fn secret_id(&self) -> &Secret {
		&self.secret_id
	}

	/// Redirect URI registered with the broker.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}
}
impl Debug for FyersCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FyersCredentials")
			.field("app_id", &self.app_id)
			.field("secret_id", &self.secret_id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.finish()
	}
}
impl TryFrom<RawFyersCredentials> for FyersCredentials {
	type Error = ValidationError;

	fn try_from(raw: RawFyersCredentials) -> Result<Self, Self::Error> {
		Self::new(raw.app_id, raw.secret_id, raw.redirect_uri)
	}
}

#[derive(Deserialize)]
struct RawFyersCredentials {
	app_id: AppId,
	secret_id: Secret,
	redirect_uri: Url,
}

/// Credentials for the five-step (HDFC Securities) login flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHdfcCredentials")]
pub struct HdfcCredentials {
	api_key: ApiKey,
	username: String,
	password: Secret,
	api_secret: Secret,
}
impl HdfcCredentials {
	/// Builds a validated credential record.
	pub fn new(
		api_key: ApiKey,
		username: impl Into<String>,
		password: impl Into<Secret>,
		api_secret: impl Into<Secret>,
	) -> Result<Self, ValidationError> {
		let username = username.into();
		let password = password.into();
		let api_secret = api_secret.into();

		if username.trim().is_empty() {
			return Err(ValidationError::EmptyField { field: "username" });
		}

		require_secret("password", &password)?;
		require_secret("api_secret", &api_secret)?;

		Ok(Self { api_key, username, password, api_secret })
	}

	/// Broker-app identity used to namespace session records.
	pub fn api_key(&self) -> &ApiKey {
		&self.api_key
	}

	/// Trading account username.
	pub fn username(&self) -> &str {
		&self.username
	}

	/// Trading account password.
	pub fn password(&self) -> &Secret {
		&self.password
	}

	/// API secret exchanged for the final access token.
	pub fn api_secret(&self) -> &Secret {
		&self.api_secret
	}
}
impl Debug for HdfcCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HdfcCredentials")
			.field("api_key", &self.api_key)
			.field("username", &self.username)
			.field("password", &self.password)
			.field("api_secret", &self.api_secret)
			.finish()
	}
}
impl TryFrom<RawHdfcCredentials> for HdfcCredentials {
	type Error = ValidationError;

	fn try_from(raw: RawHdfcCredentials) -> Result<Self, Self::Error> {
		Self::new(raw.api_key, raw.username, raw.password, raw.api_secret)
	}
}

#[derive(Deserialize)]
struct RawHdfcCredentials {
	api_key: ApiKey,
	username: String,
	password: Secret,
	#[serde(alias = "apiSecret")]
	api_secret: Secret,
}

/// Parses loosely typed JSON credentials into a validated record.
///
/// Failures carry the JSON path of the offending field. Serde messages that would quote the
/// rejected input are reduced to their expectation so secrets never reach error details.
pub fn parse_credentials<T>(value: &JsonValue) -> Result<T, ValidationError>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(value).map_err(|err| {
		let path = err.path().to_string();

		ValidationError::Credentials { path, message: sanitize_message(&err.inner().to_string()) }
	})
}

fn require_secret(field: &'static str, secret: &Secret) -> Result<(), ValidationError> {
	if secret.expose().trim().is_empty() {
		Err(ValidationError::EmptyField { field })
	} else {
		Ok(())
	}
}

fn sanitize_message(message: &str) -> String {
	if message.starts_with("invalid type") || message.starts_with("invalid value") {
		match message.split_once(", expected ") {
			Some((_, expected)) => format!("expected {expected}"),
			None => "invalid value".into(),
		}
	} else {
		message.to_owned()
	}
}
