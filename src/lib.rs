//! Uniform multi-broker login orchestration: per-broker auth state machines, CSRF-checked
//! redirects, and an encrypted session store for the resulting tokens.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod provider;
pub mod service;
pub mod session;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		broker::AdapterFactory,
		http::{
			BrokerHttpClient, BrokerRequest, BrokerResponse, HttpFuture, HttpMethod,
			ReqwestHttpClient,
		},
		provider::{BrokerDescriptor, BrokerKind},
		session::{EncryptedSessionStore, SessionSecret},
	};

	/// Builds a session store keyed by a freshly generated secret.
	pub fn test_session_store() -> Arc<EncryptedSessionStore> {
		Arc::new(EncryptedSessionStore::new(SessionSecret::generate()))
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a descriptor for `kind` rooted at the provided mock server base URL.
	pub fn test_descriptor(kind: BrokerKind, base_url: &str) -> BrokerDescriptor {
		let base_url = Url::parse(base_url).expect("Mock broker base URL should parse.");

		BrokerDescriptor::builder(kind)
			.base_url(base_url)
			.build()
			.expect("Mock broker descriptor should build successfully.")
	}

	/// Constructs an [`AdapterFactory`] whose HTTP brokers all point at `base_url`, backed by a
	/// throwaway session store and the reqwest transport used across integration tests.
	pub fn build_reqwest_test_factory(
		base_url: &str,
	) -> (AdapterFactory<ReqwestHttpClient>, Arc<EncryptedSessionStore>) {
		let sessions = test_session_store();
		let http_client = Arc::new(test_reqwest_http_client());
		let factory = AdapterFactory::with_http_client(sessions.clone(), http_client)
			.with_descriptor(test_descriptor(BrokerKind::Fyers, base_url))
			.with_descriptor(test_descriptor(BrokerKind::Hdfc, base_url));

		(factory, sessions)
	}

	/// In-memory transport that replays canned responses and records every request it sees.
	///
	/// Requests beyond the scripted responses fail with a transport error, so tests that expect
	/// zero network calls fail loudly instead of hanging on a real socket.
	#[derive(Debug, Default)]
	pub struct ScriptedHttpClient {
		responses: Mutex<VecDeque<BrokerResponse>>,
		requests: Mutex<Vec<BrokerRequest>>,
	}
	impl ScriptedHttpClient {
		/// Queues a JSON response with the provided status code.
		pub fn respond(self, status: u16, body: serde_json::Value) -> Self {
			self.responses.lock().push_back(BrokerResponse::new(status, body.to_string()));

			self
		}

		/// Returns `(method, path)` pairs for every request issued so far.
		pub fn calls(&self) -> Vec<(HttpMethod, String)> {
			self.requests
				.lock()
				.iter()
				.map(|request| (request.method, request.url.path().to_owned()))
				.collect()
		}

		/// Returns the request paths in call order.
		pub fn paths(&self) -> Vec<String> {
			self.calls().into_iter().map(|(_, path)| path).collect()
		}

		/// Returns every recorded request, including query strings and JSON bodies.
		pub fn requests(&self) -> Vec<BrokerRequest> {
			self.requests.lock().clone()
		}
	}
	impl BrokerHttpClient for ScriptedHttpClient {
		fn execute(&self, request: BrokerRequest) -> HttpFuture<'_, BrokerResponse> {
			let path = request.url.path().to_owned();

			self.requests.lock().push(request);

			let next = self.responses.lock().pop_front();

			Box::pin(async move {
				next.ok_or_else(|| crate::error::TransportError::Other {
					message: format!("No scripted response for {path}."),
				})
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
