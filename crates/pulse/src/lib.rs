//! The Pulse request-serving core: tenant routing and isolation, the
//! authentication/authorization pipeline, the entitlement evaluator, the
//! SSE/streaming contract, and the tenant-aware rate limiter and session
//! store.
//!
//! Every HTTP endpoint and background task in Pulse consults this crate.
//! Domain handlers (alerts, backups, recovery points, ...), the AI engine's
//! model-calling internals, and the Proxmox/PBS/PMG/Docker/K8s protocol
//! clients live outside it and are treated as collaborators.

pub mod authn;
pub mod authz;
pub mod config;
pub mod demo;
pub mod entitlement;
pub mod error;
pub mod org;
pub mod principal;
pub mod ratelimit;
pub mod respond;
pub mod session;
pub mod sse;
pub mod tenant;

pub use config::Config;
pub use error::{CoreError, ErrorBody};
pub use principal::Principal;
