//! C2 Session Store: persisted, hashed session tokens with TTL,
//! user-agent/IP binding, and a sweep loop.

pub mod cookie;
pub mod store;

pub use cookie::{CookiePolicy, derive_cookie_policy};
pub use store::{Session, SessionStore, hash_token};
