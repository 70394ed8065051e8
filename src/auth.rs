//! Broker identities, redacted secrets, and validated per-broker credentials.

pub mod credentials;
pub mod id;
pub mod secret;

pub use credentials::*;
pub use id::*;
pub use secret::*;
