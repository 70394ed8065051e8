//! Shared helpers for flow implementations (step runner, response decoding, guards).

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	error::RequestFailedError,
	http::{BrokerHttpClient, BrokerRequest, BrokerResponse},
	obs,
	provider::BrokerKind,
};

type GuardKey = (BrokerKind, String);

/// Per-identity singleflight guards shared by every adapter built from one factory.
///
/// Two token exchanges for the same broker-app identity never overlap; distinct identities run
/// concurrently. An identity's entry lives only while a flow holds or awaits its lock.
#[derive(Clone, Debug, Default)]
pub struct FlowGuards(Arc<Mutex<HashMap<GuardKey, Arc<AsyncMutex<()>>>>>);
impl FlowGuards {
	/// Waits for exclusive access to `identity` and holds it until the returned guard drops.
	pub async fn lock(&self, kind: BrokerKind, identity: &str) -> FlowGuard {
		let key = (kind, identity.to_owned());
		let lock = self.0.lock().entry(key.clone()).or_default().clone();
		let mut guard = FlowGuard { guards: self.clone(), key, lock, held: None };

		guard.held = Some(guard.lock.lock_arc().await);

		guard
	}

	/// Number of identities with a flow in progress.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when no flow is in progress.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}

/// Exclusive access to one identity, released on drop.
pub struct FlowGuard {
	guards: FlowGuards,
	key: GuardKey,
	lock: Arc<AsyncMutex<()>>,
	held: Option<MutexGuardArc<()>>,
}
impl Drop for FlowGuard {
	fn drop(&mut self) {
		// Waiters clone the lock under the table mutex, so a count of two (table + self) means
		// nobody else is queued.
		let mut guards = self.guards.0.lock();

		self.held = None;

		if Arc::strong_count(&self.lock) == 2
			&& guards.get(&self.key).is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
		{
			guards.remove(&self.key);
		}
	}
}
impl Debug for FlowGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowGuard").field("key", &self.key).field("held", &self.held.is_some()).finish()
	}
}

/// Sends one protocol step and classifies the outcome.
///
/// Transport failures become [`RequestFailedError::Transport`] and non-2xx statuses become
/// [`Error::BrokerApi`] with the verbatim body. The successful response is returned undecoded.
pub(crate) async fn send_step<C>(
	client: &C,
	stage: &'static str,
	request: BrokerRequest,
) -> Result<BrokerResponse>
where
	C: ?Sized + BrokerHttpClient,
{
	let method = request.method;
	let path = request.url.path().to_owned();
	let response = match client.execute(request).await {
		Ok(response) => response,
		Err(source) => {
			obs::record_broker_call(stage, method.as_str(), &path, None);

			return Err(RequestFailedError::Transport { stage, source }.into());
		},
	};

	obs::record_broker_call(stage, method.as_str(), &path, Some(response.status));

	if !response.is_success() {
		return Err(Error::BrokerApi { stage, status: response.status, body: response.body_text() });
	}

	Ok(response)
}

/// Decodes a successful response body, reporting the JSON path of any missing or malformed field.
pub(crate) fn decode_body<T>(stage: &'static str, response: &BrokerResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| RequestFailedError::UnexpectedResponse { stage, source }.into())
}

/// Serializes a typed request body.
pub(crate) fn encode_body<T>(stage: &'static str, body: &T) -> Result<JsonValue>
where
	T: Serialize,
{
	serde_json::to_value(body).map_err(|source| RequestFailedError::Encode { stage, source }.into())
}

/// Runs [`send_step`] followed by [`decode_body`].
pub(crate) async fn call_step<C, T>(
	client: &C,
	stage: &'static str,
	request: BrokerRequest,
) -> Result<T>
where
	C: ?Sized + BrokerHttpClient,
	T: DeserializeOwned,
{
	let response = send_step(client, stage, request).await?;

	decode_body(stage, &response)
}
