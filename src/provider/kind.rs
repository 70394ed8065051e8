//! Supported broker variants and name parsing.

// self
use crate::{_prelude::*, error::ConfigError};

/// Broker variants the crate knows how to log into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
	/// Fyers API v3, a two-call OAuth-style flow.
	Fyers,
	/// HDFC Securities InvestRight, a five-call token/2FA/consent flow.
	Hdfc,
	/// Deterministic offline adapter for tests and demos.
	Mock,
}
impl BrokerKind {
	/// Every supported variant.
	pub const ALL: [BrokerKind; 3] = [BrokerKind::Fyers, BrokerKind::Hdfc, BrokerKind::Mock];

	/// Returns the stable broker name used at the call boundary.
	pub const fn as_str(self) -> &'static str {
		match self {
			BrokerKind::Fyers => "fyers",
			BrokerKind::Hdfc => "hdfc",
			BrokerKind::Mock => "mock",
		}
	}
}
impl Display for BrokerKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for BrokerKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let name = s.trim();

		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str().eq_ignore_ascii_case(name))
			.ok_or_else(|| ConfigError::UnknownBroker { name: name.to_owned() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn names_parse_case_insensitively() {
		assert_eq!("FYERS".parse::<BrokerKind>().expect("Known broker should parse."), BrokerKind::Fyers);
		assert_eq!(" hdfc ".parse::<BrokerKind>().expect("Known broker should parse."), BrokerKind::Hdfc);
	}

	#[test]
	fn unknown_names_are_configuration_errors() {
		let err = "zerodha".parse::<BrokerKind>().expect_err("Unknown broker should fail.");

		assert!(matches!(err, ConfigError::UnknownBroker { ref name } if name == "zerodha"));
	}
}
