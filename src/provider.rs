//! Broker-facing descriptors (data) used by the login flows.
//!
//! `kind` names the supported broker variants; `descriptor` exposes validated endpoint metadata
//! (`BrokerDescriptor`) so flows never hard-code hosts and tests can point a broker at a mock
//! server.

pub mod builder;
pub mod descriptor;
pub mod kind;

pub use builder::*;
pub use descriptor::*;
pub use kind::*;
