//! Process configuration consumed by the login service.
//!
//! The crate owns none of its settings; it reads a single session secret plus optional
//! per-broker default credentials from the environment (or any lookup function in tests).

// self
use crate::{
	_prelude::*,
	error::{ConfigError, ValidationError},
	provider::BrokerKind,
	session::{EncryptedSessionStore, SessionSecret},
};

/// Base64-encoded 32-byte key for the session store. Required.
pub const SECRET_KEY_VAR: &str = "BROKER_AUTH_SECRET_KEY";
/// Broker selected when the caller does not name one. Defaults to `mock`.
pub const ADAPTER_VAR: &str = "BROKER_AUTH_ADAPTER";
/// JSON object with default Fyers credentials.
pub const FYERS_CREDENTIALS_VAR: &str = "BROKER_AUTH_FYERS_CREDENTIALS";
/// JSON object with default HDFC credentials.
pub const HDFC_CREDENTIALS_VAR: &str = "BROKER_AUTH_HDFC_CREDENTIALS";

/// Validated process configuration.
#[derive(Clone)]
pub struct AuthConfig {
	secret: SessionSecret,
	default_adapter: BrokerKind,
	default_credentials: HashMap<BrokerKind, JsonMap<String, JsonValue>>,
}
impl AuthConfig {
	/// Builds a configuration around an explicit secret, with no default credentials.
	pub fn new(secret: SessionSecret) -> Self {
		Self { secret, default_adapter: BrokerKind::Mock, default_credentials: HashMap::new() }
	}

	/// Reads the configuration from process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`, failing fast on a missing or malformed key.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let secret = SessionSecret::from_base64(&lookup(SECRET_KEY_VAR).unwrap_or_default())?;
		let default_adapter = match lookup(ADAPTER_VAR).filter(|name| !name.trim().is_empty()) {
			Some(name) => name.parse()?,
			None => BrokerKind::Mock,
		};
		let mut config = Self::new(secret).with_default_adapter(default_adapter);

		for (kind, var) in [(BrokerKind::Fyers, FYERS_CREDENTIALS_VAR), (BrokerKind::Hdfc, HDFC_CREDENTIALS_VAR)]
		{
			let Some(raw) = lookup(var).filter(|raw| !raw.trim().is_empty()) else {
				continue;
			};
			let defaults = serde_json::from_str::<JsonMap<String, JsonValue>>(&raw).map_err(|source| {
				ConfigError::InvalidDefaultCredentials { broker: kind.as_str(), source }
			})?;

			config = config.with_default_credentials(kind, defaults);
		}

		Ok(config)
	}

	/// Overrides the broker used when the caller names none.
	pub fn with_default_adapter(mut self, kind: BrokerKind) -> Self {
		self.default_adapter = kind;

		self
	}

	/// Sets default credential fields for `kind`.
	pub fn with_default_credentials(
		mut self,
		kind: BrokerKind,
		defaults: JsonMap<String, JsonValue>,
	) -> Self {
		self.default_credentials.insert(kind, defaults);

		self
	}

	/// Broker used when the caller names none.
	pub fn default_adapter(&self) -> BrokerKind {
		self.default_adapter
	}

	/// Default credential fields for `kind`, if configured.
	pub fn default_credentials(&self, kind: BrokerKind) -> Option<&JsonMap<String, JsonValue>> {
		self.default_credentials.get(&kind)
	}

	/// Builds an empty session store sealed with the configured secret.
	pub fn session_store(&self) -> EncryptedSessionStore {
		EncryptedSessionStore::new(self.secret.clone())
	}
}
impl Debug for AuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthConfig")
			.field("secret", &self.secret)
			.field("default_adapter", &self.default_adapter)
			.field(
				"default_credentials",
				&self.default_credentials.keys().map(|kind| kind.as_str()).collect::<Vec<_>>(),
			)
			.finish()
	}
}

/// Overlays explicit per-call credentials on top of configured defaults.
///
/// Explicit fields always win. An explicit `null` field counts as absent so it never erases a
/// configured default. A non-object payload is rejected.
pub fn merge_credentials(
	defaults: Option<&JsonMap<String, JsonValue>>,
	explicit: Option<&JsonValue>,
) -> Result<JsonValue, ValidationError> {
	let mut merged = defaults.cloned().unwrap_or_default();

	match explicit {
		None | Some(JsonValue::Null) => {},
		Some(JsonValue::Object(fields)) =>
			for (name, value) in fields {
				if !value.is_null() {
					merged.insert(name.clone(), value.clone());
				}
			},
		Some(_) =>
			return Err(ValidationError::Credentials {
				path: ".".into(),
				message: "expected a JSON object".into(),
			}),
	}

	Ok(JsonValue::Object(merged))
}
