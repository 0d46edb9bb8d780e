use serde::Serialize;

/// Coarse failure taxonomy shared by every fallible operation in the core.
///
/// Middleware and handlers translate a `(ErrorKind, detail)` pair into the
/// structured JSON body of spec.md §4.12; nothing downstream of a handler
/// should need to pattern-match on a concrete error type once it has been
/// classified into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Subsystem unavailable (nil auth config, store unreachable). Maps to 503.
	Unavailable,
	/// Malformed or missing input. Maps to 400.
	Invalid,
	/// No principal, or an invalid credential. Maps to 401.
	Unauthenticated,
	/// Principal lacks access. Maps to 403.
	Forbidden,
	/// Capability or subscription state missing. Maps to 402.
	EntitlementRequired,
	/// Rate limit exceeded. Maps to 429.
	RateLimited,
	/// Unknown resource. Maps to 404.
	NotFound,
	/// Unclassified internal failure. Maps to 500; never leaks `detail` verbatim.
	Internal,
}

impl ErrorKind {
	pub fn status_class(self) -> &'static str {
		match self {
			ErrorKind::Internal => "server_error",
			ErrorKind::Unavailable => "server_error",
			_ => "client_error",
		}
	}
}
