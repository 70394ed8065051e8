//! Validating builder for broker descriptors.

// self
use crate::{
	_prelude::*,
	provider::{BrokerDescriptor, BrokerKind},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum BrokerDescriptorError {
	/// No base URL was supplied and the broker has no production default.
	#[error("The {kind} broker has no default API root; supply a base URL.")]
	MissingBaseUrl {
		/// Broker being described.
		kind: BrokerKind,
	},
	/// Base URL must use HTTPS unless it points at a loopback host.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// Base URL must be a plain hierarchical root.
	#[error("The base URL cannot carry a query string or fragment: {url}.")]
	UnexpectedQuery {
		/// URL that failed validation.
		url: String,
	},
	/// Base URL cannot have path segments appended.
	#[error("The base URL cannot be used as an API root: {url}.")]
	CannotBeABase {
		/// URL that failed validation.
		url: String,
	},
}

/// Builder for [`BrokerDescriptor`] values.
#[derive(Debug)]
pub struct BrokerDescriptorBuilder {
	/// Broker being described.
	pub kind: BrokerKind,
	/// Optional API root override.
	pub base_url: Option<Url>,
}
impl BrokerDescriptorBuilder {
	/// Creates a new builder for the provided broker.
	pub fn new(kind: BrokerKind) -> Self {
		Self { kind, base_url: None }
	}

	/// Overrides the API root.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<BrokerDescriptor, BrokerDescriptorError> {
		let descriptor = match self.base_url {
			Some(base_url) => BrokerDescriptor { kind: self.kind, base_url },
			None => BrokerDescriptor::production(self.kind)
				.ok_or(BrokerDescriptorError::MissingBaseUrl { kind: self.kind })?,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl BrokerDescriptor {
	fn validate(&self) -> Result<(), BrokerDescriptorError> {
		let url = &self.base_url;

		if url.cannot_be_a_base() {
			return Err(BrokerDescriptorError::CannotBeABase { url: url.to_string() });
		}
		if url.query().is_some() || url.fragment().is_some() {
			return Err(BrokerDescriptorError::UnexpectedQuery { url: url.to_string() });
		}
		if url.scheme() != "https" && !(url.scheme() == "http" && is_loopback(url)) {
			return Err(BrokerDescriptorError::InsecureBaseUrl { url: url.to_string() });
		}

		Ok(())
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}
