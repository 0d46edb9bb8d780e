//! C12 Error/Response Conventions: route normalization and status
//! classification for logging/metrics. The error body shape itself lives in
//! [`crate::error`].

use axum::http::StatusCode;

const MAX_SEGMENTS: usize = 5;
const UUID_LEN: usize = 36;
const TOKEN_MIN_LEN: usize = 32;

fn is_all_digits(segment: &str) -> bool {
	!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn looks_like_uuid(segment: &str) -> bool {
	segment.len() == UUID_LEN && segment.bytes().enumerate().all(|(i, b)| if matches!(i, 8 | 13 | 18 | 23) { b == b'-' } else { b.is_ascii_hexdigit() })
}

/// Normalizes a request path for logging/metrics cardinality control
/// (spec.md §4.12): numeric segments become `:id`, UUIDs become `:uuid`,
/// long opaque segments become `:token`, the result is capped at five
/// segments, and any query string is stripped first.
pub fn normalize_route(path: &str) -> String {
	let path = path.split('?').next().unwrap_or(path);
	let mut normalized = String::from("/");
	let segments = path.split('/').filter(|s| !s.is_empty()).take(MAX_SEGMENTS);

	let mut parts = Vec::new();
	for segment in segments {
		let replaced = if is_all_digits(segment) {
			":id".to_string()
		} else if looks_like_uuid(segment) {
			":uuid".to_string()
		} else if segment.len() > TOKEN_MIN_LEN {
			":token".to_string()
		} else {
			segment.to_string()
		};
		parts.push(replaced);
	}
	normalized.push_str(&parts.join("/"));
	normalized
}

/// Status classification for metrics (spec.md §4.12): `5xx` -> server_error,
/// `4xx` -> client_error, else `none`.
pub fn status_class(status: StatusCode) -> &'static str {
	if status.is_server_error() {
		"server_error"
	} else if status.is_client_error() {
		"client_error"
	} else {
		"none"
	}
}
