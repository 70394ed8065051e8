//! Optional observability helpers for broker login flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `broker_auth.flow` with the `flow` (broker
//!   operation) and `stage` (call site) fields, plus one event per broker round trip.
//! - Enable `metrics` to increment the `broker_auth_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// OAuth-style login (initiate + complete).
	FyersLogin,
	/// Fyers refresh-token exchange.
	FyersRefresh,
	/// Five-step login (initiate + complete).
	HdfcLogin,
	/// Liveness probe against an authenticated endpoint.
	SessionStatus,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::FyersLogin => "fyers_login",
			FlowKind::FyersRefresh => "fyers_refresh",
			FlowKind::HdfcLogin => "hdfc_login",
			FlowKind::SessionStatus => "session_status",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span and records attempt/success/failure around it.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(err) => {
			record_flow_failure(kind, stage, err);
			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}
