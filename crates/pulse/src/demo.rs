//! C11 Demo Mode Gate: a narrow allowlist of safe requests when demo mode
//! is on; fully transparent otherwise (spec.md §4.11).

use axum::http::{HeaderMap, Method};

use crate::error::CoreError;

const ALLOWED_POST_PATHS: [&str; 4] = ["/api/login", "/api/oidc/login", "/api/oidc/callback", "/api/logout"];

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
	headers
		.get(axum::http::header::UPGRADE)
		.and_then(|v| v.to_str().ok())
		.map(|v| v.eq_ignore_ascii_case("websocket"))
		.unwrap_or(false)
}

/// Returns `Ok(())` if the request is allowed while demo mode is on.
/// Callers only invoke this when `demo_mode` is true; when false, skip the
/// gate entirely (it is otherwise transparent).
pub fn check_demo_mode(method: &Method, path: &str, headers: &HeaderMap) -> Result<(), CoreError> {
	if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
		return Ok(());
	}
	if is_websocket_upgrade(headers) {
		return Ok(());
	}
	if *method == Method::POST && ALLOWED_POST_PATHS.contains(&path) {
		return Ok(());
	}
	Err(CoreError::DemoMode)
}
