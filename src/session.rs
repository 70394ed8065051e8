//! Process-lifetime encrypted session store, namespaced per broker identity.
//!
//! [`EncryptedSessionStore`] keeps short-lived secrets (state nonces, access and refresh tokens)
//! sealed with AES-256-GCM under a single process-wide key. Records live until the process
//! exits; nothing is written to disk. Concurrent writers to the same key race and the last
//! writer wins; distinct keys never interfere.

pub mod cipher;
pub mod key;

pub use cipher::{SealedValue, SessionSecret};
pub use key::SessionKey;

// self
use crate::{_prelude::*, error::ConfigError, session::cipher::SessionCipher};

/// Field name for the OAuth-style redirect state nonce.
pub const STATE_FIELD: &str = "state";
/// Field name for the broker access token.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";
/// Field name for the broker refresh token.
pub const REFRESH_TOKEN_FIELD: &str = "refresh_token";

/// Integrity failures raised by the session store. Always fatal; never retried.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IntegrityError {
	/// Value could not be sealed.
	#[error("Session value for `{key}` could not be sealed.")]
	Seal {
		/// Namespaced key being written.
		key: String,
	},
	/// Stored blob failed authentication (corrupted, truncated, or foreign).
	#[error("Session value for `{key}` failed authentication.")]
	Tampered {
		/// Namespaced key being read.
		key: String,
	},
}

/// Confidential key/value store for small string secrets.
pub struct EncryptedSessionStore {
	cipher: SessionCipher,
	entries: RwLock<HashMap<SessionKey, SealedValue>>,
}
impl EncryptedSessionStore {
	/// Creates an empty store sealed under `secret`.
	pub fn new(secret: SessionSecret) -> Self {
		Self { cipher: SessionCipher::new(&secret), entries: Default::default() }
	}

	/// Creates an empty store from a base64-encoded 32-byte key.
	pub fn from_base64_key(encoded: &str) -> Result<Self, ConfigError> {
		SessionSecret::from_base64(encoded).map(Self::new)
	}

	/// Seals `value` and stores it under `namespace:field`, replacing any prior value.
	pub fn set(&self, namespace: &str, field: &str, value: &str) -> Result<(), IntegrityError> {
		let key = SessionKey::new(namespace, field);
		let sealed = self.cipher.seal(&key, value)?;

		self.entries.write().insert(key, sealed);

		Ok(())
	}

	/// Opens the value stored under `namespace:field`.
	///
	/// A key that was never written yields `Ok(None)`; a blob that fails authentication yields
	/// [`IntegrityError::Tampered`].
	pub fn get(&self, namespace: &str, field: &str) -> Result<Option<String>, IntegrityError> {
		let key = SessionKey::new(namespace, field);
		let sealed = self.entries.read().get(&key).cloned();

		sealed.map(|sealed| self.cipher.open(&key, &sealed)).transpose()
	}

	/// Drops the value stored under `namespace:field`, returning whether one existed.
	pub fn remove(&self, namespace: &str, field: &str) -> bool {
		self.entries.write().remove(&SessionKey::new(namespace, field)).is_some()
	}

	/// Returns `true` when a value is stored under `namespace:field`.
	pub fn contains(&self, namespace: &str, field: &str) -> bool {
		self.entries.read().contains_key(&SessionKey::new(namespace, field))
	}

	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing has been stored yet.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}
impl Debug for EncryptedSessionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EncryptedSessionStore").field("records", &self.len()).finish()
	}
}
