//! Primitives shared by the `pulse` request-serving core and the `pulse-app` binary.
//!
//! Nothing in this crate knows about organizations, principals, or entitlements -
//! it only provides the ambient stack (clock, atomic snapshots, shutdown, telemetry)
//! that the business logic crate builds on.

pub mod clock;
pub mod error;
pub mod shutdown;
pub mod snapshot;
pub mod telemetry;

pub use clock::Clock;
pub use error::ErrorKind;
pub use snapshot::Snapshot;
