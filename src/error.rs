//! Broker-level error taxonomy shared across flows, adapters, and the session store.
//!
//! Every failure maps onto a stable machine-readable code through [`Error::code`], and
//! [`ApiError`] renders the structured object handed to callers. Local checks
//! ([`ValidationError`], CSRF, [`PreconditionError`]) always fail before any broker call.

// crates.io
use uuid::Uuid;
// self
use crate::{_prelude::*, session::IntegrityError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed or missing caller input.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Returned redirect state does not match the stored nonce.
	#[error("Returned state does not match the stored login state for `{identity}`.")]
	Csrf {
		/// Broker-app identity whose nonce was checked.
		identity: String,
	},
	/// A local precondition for the next step does not hold.
	#[error(transparent)]
	Precondition(#[from] PreconditionError),
	/// Broker answered with an error status or an explicit error payload.
	#[error("Broker rejected the {stage} step with HTTP {status}: {}.", upstream_message(.body))]
	BrokerApi {
		/// Protocol step that failed.
		stage: &'static str,
		/// Upstream HTTP status code.
		status: u16,
		/// Upstream response body, verbatim.
		body: String,
	},
	/// Transport failure or an unusable successful response.
	#[error(transparent)]
	RequestFailed(#[from] RequestFailedError),
	/// Session-store integrity failure; never retried.
	#[error("{0}")]
	Integrity(
		#[from]
		#[source]
		IntegrityError,
	),
	/// The broker variant does not offer the requested capability.
	#[error("The {broker} adapter does not support {operation}.")]
	Unsupported {
		/// Broker name.
		broker: &'static str,
		/// Capability label.
		operation: &'static str,
	},
}
impl Error {
	/// Stable machine-readable code for the failure category.
	pub fn code(&self) -> &'static str {
		match self {
			Error::Validation(_) => "VALIDATION_ERROR",
			Error::Config(_) => "CONFIG_ERROR",
			Error::Csrf { .. } => "CSRF_ERROR",
			Error::Precondition(_) => "REQUEST_PRECONDITION_FAILED",
			Error::BrokerApi { .. } => "BROKER_API_ERROR",
			Error::RequestFailed(_) => "BROKER_REQUEST_FAILED",
			Error::Integrity(_) => "INTEGRITY_ERROR",
			Error::Unsupported { .. } => "UNSUPPORTED_OPERATION",
		}
	}

	/// Non-secret diagnostic context for the failure, if any.
	pub fn details(&self) -> Option<JsonMap<String, JsonValue>> {
		let mut details = JsonMap::new();

		match self {
			Error::Validation(ValidationError::Credentials { path, .. }) => {
				details.insert("path".into(), path.clone().into());
			},
			Error::Validation(
				ValidationError::EmptyField { field } | ValidationError::InvalidField { field, .. },
			) => {
				details.insert("field".into(), (*field).into());
			},
			Error::Csrf { identity } => {
				details.insert("identity".into(), identity.clone().into());
			},
			Error::BrokerApi { stage, status, body } => {
				details.insert("stage".into(), (*stage).into());
				details.insert("status".into(), (*status).into());
				details.insert("body".into(), body.clone().into());
			},
			Error::RequestFailed(err) => {
				details.insert("stage".into(), err.stage().into());
			},
			Error::Unsupported { broker, operation } => {
				details.insert("broker".into(), (*broker).into());
				details.insert("operation".into(), (*operation).into());
			},
			_ => return None,
		}

		Some(details)
	}

	/// Upstream HTTP status carried by the failure, when one exists.
	pub fn upstream_status(&self) -> Option<u16> {
		match self {
			Error::BrokerApi { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Caller input rejected before any broker interaction.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Credential payload failed to deserialize.
	#[error("Credentials are invalid at `{path}`: {message}.")]
	Credentials {
		/// JSON path of the offending field (`.` for the payload itself).
		path: String,
		/// Sanitized failure description.
		message: String,
	},
	/// A required field was blank.
	#[error("Field `{field}` must not be empty.")]
	EmptyField {
		/// Field name.
		field: &'static str,
	},
	/// A field is present but has the wrong shape.
	#[error("Field `{field}` {reason}.")]
	InvalidField {
		/// Field name.
		field: &'static str,
		/// Short description of the expected shape.
		reason: &'static str,
	},
	/// Login state handed back by the caller belongs to another broker.
	#[error("Login state was issued by the {found} adapter, not {expected}.")]
	SessionMismatch {
		/// Broker that received the state.
		expected: &'static str,
		/// Broker recorded inside the state.
		found: &'static str,
	},
	/// Redirect URL could not be interpreted.
	#[error("Redirect URL is invalid: {reason}.")]
	InvalidRedirect {
		/// Short description of the problem.
		reason: String,
	},
}

/// Configuration and wiring failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Session secret key was not supplied.
	#[error("Session secret key is missing.")]
	MissingSecretKey,
	/// Session secret key could not be decoded into 32 bytes.
	#[error("Session secret key is malformed: {reason}.")]
	InvalidSecretKey {
		/// Short description of the problem.
		reason: String,
	},
	/// No adapter is registered under the requested name.
	#[error("Unknown broker `{name}`.")]
	UnknownBroker {
		/// Name supplied by the caller.
		name: String,
	},
	/// Broker descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::BrokerDescriptorError),
	/// Endpoint URL could not be derived from the descriptor base URL.
	#[error("Endpoint `{path}` cannot be joined onto the broker base URL.")]
	InvalidEndpoint {
		/// Relative endpoint path.
		path: &'static str,
	},
	/// Default credentials from configuration are not valid JSON.
	#[error("Default credentials for {broker} are not valid JSON.")]
	InvalidDefaultCredentials {
		/// Broker name.
		broker: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Local precondition failures detected before spending a broker round trip.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PreconditionError {
	/// Second-factor authentication is enabled but no one-time code was supplied.
	#[error("A one-time code is required because two-factor authentication is enabled.")]
	MissingOtp,
	/// No refresh token is stored for the identity.
	#[error("No refresh token is stored for `{identity}`.")]
	MissingRefreshToken {
		/// Broker-app identity.
		identity: String,
	},
	/// The flow was resumed from a state that cannot run the requested step.
	#[error("Login flow is in the {actual} state; the next step requires {expected}.")]
	OutOfOrder {
		/// State required by the step.
		expected: &'static str,
		/// State recorded in the login session.
		actual: &'static str,
	},
}

/// Failures talking to the broker that are not upstream rejections.
#[derive(Debug, ThisError)]
pub enum RequestFailedError {
	/// Network, TLS, or client-side transport failure.
	#[error("Request for the {stage} step failed in transport.")]
	Transport {
		/// Protocol step that failed.
		stage: &'static str,
		/// Transport failure.
		#[source]
		source: TransportError,
	},
	/// Successful response that does not carry the expected fields.
	#[error("Broker returned an unexpected response for the {stage} step.")]
	UnexpectedResponse {
		/// Protocol step that failed.
		stage: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be encoded.
	#[error("Request body for the {stage} step could not be encoded.")]
	Encode {
		/// Protocol step that failed.
		stage: &'static str,
		/// Encoding failure.
		#[source]
		source: serde_json::Error,
	},
}
impl RequestFailedError {
	/// Protocol step the failure belongs to.
	pub fn stage(&self) -> &'static str {
		match self {
			Self::Transport { stage, .. }
			| Self::UnexpectedResponse { stage, .. }
			| Self::Encode { stage, .. } => stage,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the broker.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Transport failed for a reason it could only describe.
	#[error("HTTP client error occurred while calling the broker: {message}")]
	Other {
		/// Transport-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Structured error object surfaced to callers of the login contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
	/// Standardized, machine-readable error code.
	pub error_code: String,
	/// Human-readable message explaining the error.
	pub message: String,
	/// Optional structured, non-secret details.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<JsonMap<String, JsonValue>>,
	/// Unique identifier for tracing the request.
	pub correlation_id: Uuid,
}
impl ApiError {
	/// Builds an error object with a fresh correlation id.
	pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error_code: error_code.into(),
			message: message.into(),
			details: None,
			correlation_id: Uuid::new_v4(),
		}
	}

	/// Attaches structured details.
	pub fn with_details(mut self, details: JsonMap<String, JsonValue>) -> Self {
		self.details = Some(details);

		self
	}
}
impl From<&Error> for ApiError {
	fn from(err: &Error) -> Self {
		let api_error = ApiError::new(err.code(), err.to_string());

		match err.details() {
			Some(details) => api_error.with_details(details),
			None => api_error,
		}
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		ApiError::from(&err)
	}
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "[{}] {} (correlation id {})", self.error_code, self.message, self.correlation_id)
	}
}
impl StdError for ApiError {}

/// Extracts a short upstream message from a broker error body.
///
/// Brokers usually answer with `{"message": ...}`; other bodies are echoed trimmed.
fn upstream_message(body: &str) -> String {
	const PREVIEW_LEN: usize = 256;

	let parsed = serde_json::from_str::<JsonValue>(body).ok();
	let message = parsed
		.as_ref()
		.and_then(|value| value.get("message").or_else(|| value.get("error")))
		.and_then(JsonValue::as_str);

	match message {
		Some(message) => message.to_owned(),
		None => body.trim().chars().take(PREVIEW_LEN).collect(),
	}
}
