//! Caller-facing login contract.
//!
//! [`AuthService`] is what an HTTP front door or CLI talks to: it resolves the broker by name,
//! overlays configured default credentials, runs the adapter, and renders every failure as an
//! [`ApiError`] with a stable code and a fresh correlation id.

// self
use crate::{
	_prelude::*,
	auth::Secret,
	broker::{
		AdapterFactory, AuthResult, BrokerAdapter, CompletionInput, LoginInitiation, LoginState,
		SessionStatus,
	},
	config::{self, AuthConfig},
	error::ApiError,
	http::BrokerHttpClient,
	obs,
	provider::BrokerKind,
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestHttpClient};

/// Result type returned at the caller boundary.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Login orchestration entry point for callers.
pub struct AuthService<C>
where
	C: ?Sized + BrokerHttpClient,
{
	factory: AdapterFactory<C>,
	default_broker: BrokerKind,
	default_credentials: HashMap<BrokerKind, JsonMap<String, JsonValue>>,
}
impl<C> AuthService<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Wraps a factory with no default credentials; the default broker is `mock`.
	pub fn new(factory: AdapterFactory<C>) -> Self {
		Self { factory, default_broker: BrokerKind::Mock, default_credentials: HashMap::new() }
	}

	/// Copies the default broker and default credentials from `config`.
	pub fn with_config(mut self, config: &AuthConfig) -> Self {
		self.default_broker = config.default_adapter();

		for kind in BrokerKind::ALL {
			if let Some(defaults) = config.default_credentials(kind) {
				self.default_credentials.insert(kind, defaults.clone());
			}
		}

		self
	}

	/// Broker used when the caller names none.
	pub fn default_broker(&self) -> BrokerKind {
		self.default_broker
	}

	/// Underlying adapter factory.
	pub fn factory(&self) -> &AdapterFactory<C> {
		&self.factory
	}

	/// Starts a login. `credentials` are overlaid on the configured defaults for the broker.
	pub async fn initiate_login(
		&self,
		broker: &str,
		credentials: Option<&JsonValue>,
	) -> ApiResult<LoginInitiation> {
		self.run("initiate_login", async {
			let adapter = self.factory.resolve(broker)?;
			let credentials = config::merge_credentials(
				self.default_credentials.get(&adapter.kind()),
				credentials,
			)?;

			adapter.initiate_login(&credentials).await
		})
		.await
	}

	/// Finishes a login with the redirect parameters or one-time code collected out of band.
	///
	/// `session` is updated in place; after a failure, pass the same value back to resume from
	/// the last step that succeeded.
	pub async fn complete_login(
		&self,
		broker: &str,
		session: &mut LoginState,
		input: CompletionInput,
	) -> ApiResult<AuthResult> {
		self.run("complete_login", async {
			self.resolve(broker)?.complete_login(session, input).await
		})
		.await
	}

	/// Exchanges the stored refresh token for a new access token.
	pub async fn refresh(
		&self,
		broker: &str,
		session: &LoginState,
		pin: &Secret,
	) -> ApiResult<AuthResult> {
		self.run("refresh", async { self.resolve(broker)?.refresh(session, pin).await }).await
	}

	/// Probes whether the stored access token is still accepted.
	pub async fn session_status(
		&self,
		broker: &str,
		session: &LoginState,
	) -> ApiResult<SessionStatus> {
		self.run("session_status", async { self.resolve(broker)?.session_status(session).await })
			.await
	}

	fn resolve(&self, broker: &str) -> Result<Arc<dyn BrokerAdapter>> {
		self.factory.resolve(broker)
	}

	async fn run<T, Fut>(&self, operation: &'static str, fut: Fut) -> ApiResult<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		fut.await.map_err(|err| {
			let api_error = ApiError::from(err);

			obs::record_api_error(operation, &api_error);

			api_error
		})
	}
}
#[cfg(feature = "reqwest")]
impl AuthService<ReqwestHttpClient> {
	/// Builds the service, its session store, and a reqwest transport from `config`.
	pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
		let factory = AdapterFactory::new(Arc::new(config.session_store()))?;

		Ok(Self::new(factory).with_config(config))
	}
}
impl<C> Debug for AuthService<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthService")
			.field("factory", &self.factory)
			.field("default_broker", &self.default_broker)
			.finish()
	}
}
