//! Transport primitives for broker calls.
//!
//! The module exposes [`BrokerHttpClient`], the flows' only dependency on an HTTP stack, along
//! with the plain [`BrokerRequest`]/[`BrokerResponse`] values it exchanges. The default
//! [`ReqwestHttpClient`] lives behind the `reqwest` feature; tests and custom deployments can
//! plug in any other transport.

// self
use crate::{_prelude::*, error::TransportError};

/// Future returned by [`BrokerHttpClient::execute`].
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing broker calls.
///
/// Implementations must be `Send + Sync + 'static` so one instance can be shared by every
/// adapter built by an [`AdapterFactory`](crate::broker::AdapterFactory). Only transport failures
/// are reported as errors; any HTTP status, including 4xx/5xx, is returned as a
/// [`BrokerResponse`] so flows can classify it.
pub trait BrokerHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the raw response.
	fn execute(&self, request: BrokerRequest) -> HttpFuture<'_, BrokerResponse>;
}

/// HTTP methods used by broker protocols.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
}
impl HttpMethod {
	/// Canonical method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outbound broker call.
#[derive(Clone)]
pub struct BrokerRequest {
	/// Request method.
	pub method: HttpMethod,
	/// Fully-formed URL including query parameters.
	pub url: Url,
	/// Extra request headers.
	pub headers: Vec<(&'static str, String)>,
	/// Optional JSON body.
	pub json: Option<JsonValue>,
}
impl BrokerRequest {
	/// Builds a `GET` request.
	pub fn get(url: Url) -> Self {
		Self { method: HttpMethod::Get, url, headers: Vec::new(), json: None }
	}

	/// Builds a `POST` request.
	pub fn post(url: Url) -> Self {
		Self { method: HttpMethod::Post, url, headers: Vec::new(), json: None }
	}

	/// Adds a request header.
	pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
		self.headers.push((name, value.into()));

		self
	}

	/// Sets the JSON body.
	pub fn json(mut self, body: JsonValue) -> Self {
		self.json = Some(body);

		self
	}
}
impl Debug for BrokerRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerRequest")
			.field("method", &self.method)
			.field("path", &self.url.path())
			.field("headers", &self.headers.iter().map(|(name, _)| *name).collect::<Vec<_>>())
			.field("has_body", &self.json.is_some())
			.finish()
	}
}

/// Raw broker response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl BrokerResponse {
	/// Builds a response from a status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Lossy UTF-8 rendering of the body for diagnostics.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Broker endpoints answer directly; configure any custom [`ReqwestClient`] to disable redirect
/// following so a misconfigured base URL fails loudly instead of leaking credentials to the
/// redirect target.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds the default client with redirects disabled.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl BrokerHttpClient for ReqwestHttpClient {
	fn execute(&self, request: BrokerRequest) -> HttpFuture<'_, BrokerResponse> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				HttpMethod::Get => reqwest::Method::GET,
				HttpMethod::Post => reqwest::Method::POST,
			};
			let mut builder = client.request(method, request.url);

			for (name, value) in request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.json {
				let bytes = serde_json::to_vec(&body)
					.map_err(|e| TransportError::Other { message: e.to_string() })?;

				builder = builder
					.header(reqwest::header::CONTENT_TYPE, "application/json")
					.body(bytes);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok::<_, TransportError>(BrokerResponse { status, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_debug_hides_headers_and_body() {
		let request = BrokerRequest::post(
			Url::parse("https://broker.example.com/profile").expect("Fixture URL should parse."),
		)
		.header("authorization", "app:secret-token")
		.json(serde_json::json!({ "password": "hunter2" }));
		let rendered = format!("{request:?}");

		assert!(rendered.contains("/profile"));
		assert!(!rendered.contains("secret-token"));
		assert!(!rendered.contains("hunter2"));
	}

	#[test]
	fn success_covers_only_2xx() {
		assert!(BrokerResponse::new(204, Vec::new()).is_success());
		assert!(!BrokerResponse::new(302, Vec::new()).is_success());
		assert!(!BrokerResponse::new(400, "{}").is_success());
	}
}
