//! Runtime adapter selection by broker name.

// self
use crate::{
	_prelude::*,
	broker::{BrokerAdapter, BrokerKind, MockAdapter},
	error::ConfigError,
	flows::{FlowContext, FlowGuards, FyersAdapter, HdfcAdapter},
	http::BrokerHttpClient,
	provider::{BrokerDescriptor, BrokerDescriptorError},
	session::EncryptedSessionStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Resolves broker names to adapters that share one transport, session store, and guard table.
pub struct AdapterFactory<C>
where
	C: ?Sized + BrokerHttpClient,
{
	http_client: Arc<C>,
	sessions: Arc<EncryptedSessionStore>,
	descriptors: HashMap<BrokerKind, BrokerDescriptor>,
	guards: FlowGuards,
}
impl<C> AdapterFactory<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Creates a factory that reuses the caller-provided transport.
	///
	/// HTTP brokers default to their production descriptors; override them with
	/// [`AdapterFactory::with_descriptor`].
	pub fn with_http_client(
		sessions: Arc<EncryptedSessionStore>,
		http_client: Arc<C>,
	) -> Self {
		Self {
			http_client,
			sessions,
			descriptors: HashMap::new(),
			guards: FlowGuards::default(),
		}
	}

	/// Registers (or replaces) the descriptor for its broker.
	pub fn with_descriptor(mut self, descriptor: BrokerDescriptor) -> Self {
		self.descriptors.insert(descriptor.kind, descriptor);

		self
	}

	/// Session store shared by every adapter.
	pub fn sessions(&self) -> &Arc<EncryptedSessionStore> {
		&self.sessions
	}

	/// Parses `name` and builds the matching adapter.
	///
	/// Unknown names fail with [`ConfigError::UnknownBroker`] before any flow logic runs.
	pub fn resolve(&self, name: &str) -> Result<Arc<dyn BrokerAdapter>> {
		let kind = name.parse::<BrokerKind>()?;

		self.adapter(kind)
	}

	/// Builds the adapter for `kind`.
	pub fn adapter(&self, kind: BrokerKind) -> Result<Arc<dyn BrokerAdapter>> {
		let adapter: Arc<dyn BrokerAdapter> = match kind {
			BrokerKind::Fyers => Arc::new(FyersAdapter::new(self.context(kind)?)),
			BrokerKind::Hdfc => Arc::new(HdfcAdapter::new(self.context(kind)?)),
			BrokerKind::Mock => Arc::new(MockAdapter),
		};

		Ok(adapter)
	}

	fn context(&self, kind: BrokerKind) -> Result<FlowContext<C>, ConfigError> {
		let descriptor = self
			.descriptors
			.get(&kind)
			.cloned()
			.or_else(|| BrokerDescriptor::production(kind))
			.ok_or(BrokerDescriptorError::MissingBaseUrl { kind })?;

		Ok(FlowContext::new(self.http_client.clone(), self.sessions.clone(), descriptor)
			.with_guards(self.guards.clone()))
	}
}
#[cfg(feature = "reqwest")]
impl AdapterFactory<ReqwestHttpClient> {
	/// Creates a factory backed by the default reqwest transport.
	pub fn new(sessions: Arc<EncryptedSessionStore>) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(sessions, Arc::new(ReqwestHttpClient::new()?)))
	}
}
impl<C> Debug for AdapterFactory<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdapterFactory")
			.field("descriptors", &self.descriptors)
			.field("sessions", &self.sessions)
			.finish()
	}
}
