use axum::http::{HeaderMap, HeaderValue};

/// Fixed response headers every SSE stream carries (spec.md §4.10). Callers
/// merge these into the response before attaching the event body.
pub fn stream_headers() -> HeaderMap {
	let mut headers = HeaderMap::new();
	headers.insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
	headers.insert(axum::http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
	headers.insert(axum::http::header::CONNECTION, HeaderValue::from_static("keep-alive"));
	headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
	headers.insert(axum::http::header::TRANSFER_ENCODING, HeaderValue::from_static("identity"));
	headers
}

/// CORS headers mirroring `Origin` with credentials allowed (spec.md §4.10).
/// Mirroring (rather than a wildcard) is required because
/// `Access-Control-Allow-Credentials: true` is incompatible with `*`.
pub fn cors_headers(origin: Option<&str>) -> HeaderMap {
	let mut headers = HeaderMap::new();
	if let Some(origin) = origin {
		if let Ok(value) = HeaderValue::from_str(origin) {
			headers.insert(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
			headers.insert(axum::http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
		}
	}
	headers.insert(axum::http::header::VARY, HeaderValue::from_static("Origin"));
	headers
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stream_headers_match_the_fixed_contract() {
		let headers = stream_headers();
		assert_eq!(headers.get(axum::http::header::CONTENT_TYPE).unwrap(), "text/event-stream");
		assert_eq!(headers.get("X-Accel-Buffering").unwrap(), "no");
		assert_eq!(headers.get(axum::http::header::TRANSFER_ENCODING).unwrap(), "identity");
	}

	#[test]
	fn cors_mirrors_origin_and_sets_vary() {
		let headers = cors_headers(Some("https://app.example.com"));
		assert_eq!(headers.get(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://app.example.com");
		assert_eq!(headers.get(axum::http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
		assert_eq!(headers.get(axum::http::header::VARY).unwrap(), "Origin");
	}

	#[test]
	fn no_origin_still_sets_vary() {
		let headers = cors_headers(None);
		assert!(headers.get(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
		assert_eq!(headers.get(axum::http::header::VARY).unwrap(), "Origin");
	}
}
