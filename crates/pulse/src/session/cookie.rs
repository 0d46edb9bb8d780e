use axum::http::HeaderMap;

/// Cookie security attributes, derived from the request rather than from
/// config (spec.md §4.2) - the same binary serving plain HTTP behind a TLS
/// terminator and serving HTTPS directly must pick the right flags per
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
	pub secure: bool,
	pub same_site_none: bool,
}

fn looks_https(headers: &HeaderMap, tls_present: bool) -> bool {
	if tls_present {
		return true;
	}
	if headers
		.get("X-Forwarded-Proto")
		.and_then(|v| v.to_str().ok())
		.map(|v| v.eq_ignore_ascii_case("https"))
		.unwrap_or(false)
	{
		return true;
	}
	if let Some(forwarded) = headers.get("Forwarded").and_then(|v| v.to_str().ok()) {
		if forwarded.to_ascii_lowercase().contains("proto=https") {
			return true;
		}
	}
	// Known CDN markers imply TLS was terminated upstream.
	headers.contains_key("CF-Ray") || headers.contains_key("CF-Visitor")
}

fn behind_proxy(headers: &HeaderMap) -> bool {
	headers.contains_key("X-Forwarded-Proto")
		|| headers.contains_key("Forwarded")
		|| headers.contains_key("CF-Ray")
		|| headers.contains_key("CF-Connecting-IP")
}

/// `HttpOnly` is always set by the caller when building the `Set-Cookie`
/// header; this function only derives `Secure`/`SameSite`.
pub fn derive_cookie_policy(headers: &HeaderMap, tls_present: bool) -> CookiePolicy {
	let secure = looks_https(headers, tls_present);
	let same_site_none = behind_proxy(headers) && secure;
	CookiePolicy { secure, same_site_none }
}

impl CookiePolicy {
	pub fn same_site(&self) -> &'static str {
		if self.same_site_none { "None" } else { "Lax" }
	}
}
