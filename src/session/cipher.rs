//! AES-256-GCM sealing for session values.
//!
//! Each value is sealed with a fresh random 96-bit nonce, and the rendered [`SessionKey`] is
//! bound as associated data. A blob copied under another key, truncated, or flipped by a single
//! bit fails to open instead of yielding altered plaintext.

// crates.io
use aes_gcm::{
	Aes256Gcm, Key, Nonce,
	aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
};
use rand::Rng;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	session::{IntegrityError, SessionKey},
};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Process-wide symmetric key for the session store.
///
/// Accepts 32 bytes encoded as URL-safe or standard base64, padded or not, which covers the
/// keys produced by common key generators (including Fernet-style keys).
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret([u8; KEY_LEN]);
impl SessionSecret {
	/// Decodes a base64 key, failing fast when it is blank or not exactly 32 bytes.
	pub fn from_base64(encoded: &str) -> Result<Self, ConfigError> {
		let encoded = encoded.trim();

		if encoded.is_empty() {
			return Err(ConfigError::MissingSecretKey);
		}

		let bytes = [URL_SAFE, STANDARD, URL_SAFE_NO_PAD, STANDARD_NO_PAD]
			.iter()
			.find_map(|engine| engine.decode(encoded).ok())
			.ok_or_else(|| ConfigError::InvalidSecretKey { reason: "not valid base64".into() })?;
		let key = <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
			ConfigError::InvalidSecretKey {
				reason: format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
			}
		})?;

		Ok(Self(key))
	}

	/// Generates a random key.
	pub fn generate() -> Self {
		let mut key = [0_u8; KEY_LEN];

		rand::rng().fill(&mut key);

		Self(key)
	}

	/// Encodes the key as padded URL-safe base64.
	pub fn to_base64(&self) -> String {
		URL_SAFE.encode(self.0)
	}
}
impl Debug for SessionSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SessionSecret").field(&"<redacted>").finish()
	}
}

/// Authenticated ciphertext: `nonce || ciphertext || tag`.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedValue(Vec<u8>);
impl SealedValue {
	/// Raw sealed bytes.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	#[cfg(test)]
	pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
		Self(bytes)
	}
}
impl Debug for SealedValue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "SealedValue({} bytes)", self.0.len())
	}
}

pub(crate) struct SessionCipher(Aes256Gcm);
impl SessionCipher {
	pub(crate) fn new(secret: &SessionSecret) -> Self {
		Self(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&secret.0)))
	}

	pub(crate) fn seal(&self, key: &SessionKey, plaintext: &str) -> Result<SealedValue, IntegrityError> {
		let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
		let ciphertext = self
			.0
			.encrypt(&nonce, Payload { msg: plaintext.as_bytes(), aad: key.as_str().as_bytes() })
			.map_err(|_| IntegrityError::Seal { key: key.to_string() })?;
		let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());

		blob.extend_from_slice(&nonce);
		blob.extend_from_slice(&ciphertext);

		Ok(SealedValue(blob))
	}

	pub(crate) fn open(&self, key: &SessionKey, sealed: &SealedValue) -> Result<String, IntegrityError> {
		let tampered = || IntegrityError::Tampered { key: key.to_string() };

		if sealed.0.len() < NONCE_LEN {
			return Err(tampered());
		}

		let (nonce, ciphertext) = sealed.0.split_at(NONCE_LEN);
		let plaintext = self
			.0
			.decrypt(
				Nonce::from_slice(nonce),
				Payload { msg: ciphertext, aad: key.as_str().as_bytes() },
			)
			.map_err(|_| tampered())?;

		String::from_utf8(plaintext).map_err(|_| tampered())
	}
}
