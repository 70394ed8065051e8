//! Per-broker login state machines powered by a shared flow context.
//!
//! [`fyers`] drives the two-call OAuth-style protocol (state nonce, then auth-code exchange) and
//! [`hdfc`] drives the five-call token/credential/2FA/consent/access-token chain. Both read and
//! write secrets through the [`EncryptedSessionStore`] carried by [`FlowContext`].

pub mod common;
pub mod fyers;
pub mod hdfc;

pub use common::FlowGuards;
pub use fyers::*;
pub use hdfc::*;

// self
use crate::{
	_prelude::*,
	http::BrokerHttpClient,
	provider::BrokerDescriptor,
	session::EncryptedSessionStore,
};

/// Everything a flow needs to talk to one broker.
///
/// The context owns the HTTP client, session store, and broker descriptor references so each
/// flow implementation can focus on protocol-specific logic. Guards are shared by every context
/// cloned from the same factory.
pub struct FlowContext<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// HTTP client used for every outbound broker request.
	pub http_client: Arc<C>,
	/// Encrypted store for nonces and tokens.
	pub sessions: Arc<EncryptedSessionStore>,
	/// Broker endpoints.
	pub descriptor: BrokerDescriptor,
	/// Per-identity singleflight guards.
	pub guards: FlowGuards,
}
impl<C> FlowContext<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Creates a context with a fresh guard table.
	pub fn new(
		http_client: Arc<C>,
		sessions: Arc<EncryptedSessionStore>,
		descriptor: BrokerDescriptor,
	) -> Self {
		Self { http_client, sessions, descriptor, guards: Default::default() }
	}

	/// Replaces the guard table so several adapters share it.
	pub fn with_guards(mut self, guards: FlowGuards) -> Self {
		self.guards = guards;

		self
	}
}
impl<C> Clone for FlowContext<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			sessions: self.sessions.clone(),
			descriptor: self.descriptor.clone(),
			guards: self.guards.clone(),
		}
	}
}
impl<C> Debug for FlowContext<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowContext")
			.field("descriptor", &self.descriptor)
			.field("sessions", &self.sessions)
			.finish()
	}
}
