//! Validated endpoint metadata for each broker and its production defaults.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	provider::{BrokerDescriptorBuilder, BrokerKind},
};

/// Production API root for Fyers v3.
pub const FYERS_API_BASE: &str = "https://api.fyers.in/api/v3";
/// Production API root for HDFC Securities InvestRight.
pub const HDFC_API_BASE: &str = "https://developer.hdfcsec.com/oapi/v1";

/// Immutable broker descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerDescriptor {
	/// Broker variant the descriptor belongs to.
	pub kind: BrokerKind,
	/// API root every endpoint path is joined onto.
	pub base_url: Url,
}
impl BrokerDescriptor {
	/// Creates a new builder for the provided broker.
	pub fn builder(kind: BrokerKind) -> BrokerDescriptorBuilder {
		BrokerDescriptorBuilder::new(kind)
	}

	/// Descriptor pointing at the broker's production API, if it has one.
	pub fn production(kind: BrokerKind) -> Option<Self> {
		let base = match kind {
			BrokerKind::Fyers => FYERS_API_BASE,
			BrokerKind::Hdfc => HDFC_API_BASE,
			BrokerKind::Mock => return None,
		};

		Url::parse(base).ok().map(|base_url| Self { kind, base_url })
	}

	/// Joins a relative endpoint path (e.g. `login/validate`) onto the base URL.
	pub fn endpoint(&self, path: &'static str) -> Result<Url, ConfigError> {
		let mut url = self.base_url.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidEndpoint { path })?
			.pop_if_empty()
			.extend(path.split('/'));

		Ok(url)
	}
}
