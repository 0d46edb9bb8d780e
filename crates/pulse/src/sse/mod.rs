//! C10 SSE Broadcaster: headers, heartbeat, disconnect tracking, and a
//! client registry keyed by (ip, id).

pub mod headers;
pub mod registry;
pub mod stream;

pub use registry::{ClientId, SseRegistry};
pub use stream::{SseChannel, SseEvent};
