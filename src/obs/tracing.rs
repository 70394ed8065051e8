// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("broker_auth.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits one event per broker round trip. Only the stage, method, path and status are recorded.
pub(crate) fn record_broker_call(stage: &'static str, method: &str, path: &str, status: Option<u16>) {
	#[cfg(feature = "tracing")]
	{
		match status {
			Some(status) => tracing::debug!(stage, method, path, status, "Broker call completed."),
			None => tracing::warn!(stage, method, path, "Broker call failed in transport."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, method, path, status);
	}
}

/// Emits a failure event carrying the stable error code; never the message body.
pub(crate) fn record_flow_failure(kind: FlowKind, stage: &'static str, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(flow = kind.as_str(), stage, code = err.code(), "Broker flow failed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, stage, err);
	}
}

/// Emits an event for a liveness-probe failure that was converted into an inactive status.
pub(crate) fn record_probe_swallowed(reason: &'static str, status: Option<u16>) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(reason, status, "Session probe reported the session as inactive.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (reason, status);
	}
}

/// Emits the error code and correlation id handed back to a caller.
pub(crate) fn record_api_error(operation: &'static str, error: &crate::error::ApiError) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(
			operation,
			error_code = error.error_code.as_str(),
			correlation_id = %error.correlation_id,
			"Login request failed."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, error);
	}
}
