use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{Method, header};
use secrecy::SecretString;

use crate::principal::{ApiTokenRecord, Principal};

/// The lookups principal extraction needs, injected so extraction stays
/// testable without a real session store or OIDC provider (spec.md §4.1).
#[async_trait]
pub trait PrincipalSources: Send + Sync {
	async fn lookup_api_token(&self, raw: &SecretString) -> Option<ApiTokenRecord>;
	async fn lookup_session(&self, raw_cookie: &SecretString) -> Option<Principal>;
	async fn lookup_proxy(&self, headers: &axum::http::HeaderMap) -> Option<Principal>;
	async fn lookup_oidc(&self, raw_cookie: &SecretString) -> Option<Principal>;
}

#[derive(Debug, Clone)]
pub struct ExtractedPrincipal {
	pub principal: Principal,
	pub auth_method: Option<&'static str>,
}

fn is_upgrade_request(req: &Request) -> bool {
	req
		.headers()
		.get(header::UPGRADE)
		.and_then(|v| v.to_str().ok())
		.map(|v| v.eq_ignore_ascii_case("websocket"))
		.unwrap_or(false)
}

fn bearer_token(req: &Request) -> Option<SecretString> {
	req
		.headers()
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.map(|s| SecretString::new(s.to_string().into()))
}

fn cookie(req: &Request, name: &str) -> Option<SecretString> {
	req
		.headers()
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.flat_map(|v| v.split(';'))
		.filter_map(|kv| kv.trim().split_once('='))
		.find(|(k, _)| *k == name)
		.map(|(_, v)| SecretString::new(v.to_string().into()))
}

fn query_param(req: &Request, name: &str) -> Option<SecretString> {
	let query = req.uri().query()?;
	serde_urlencoded::from_str::<Vec<(String, String)>>(query)
		.ok()?
		.into_iter()
		.find(|(k, _)| k == name)
		.map(|(_, v)| SecretString::new(v.into()))
}

/// Runs the precedence chain of spec.md §4.1, stopping at the first match.
/// Absence of a principal is not a failure; only a *malformed* presented
/// credential is (`auth:invalid`), and even that is left for [`super::check`]
/// to turn into a response - extraction only records what was presented.
pub async fn extract_principal(req: &Request, sources: &dyn PrincipalSources) -> ExtractedPrincipal {
	// (a) API-token header
	if let Some(raw) = req
		.headers()
		.get("X-API-Token")
		.and_then(|v| v.to_str().ok())
		.map(|s| SecretString::new(s.to_string().into()))
	{
		if let Some(record) = sources.lookup_api_token(&raw).await {
			return ExtractedPrincipal {
				principal: Principal::ApiToken(record),
				auth_method: Some("api_token"),
			};
		}
	}

	// (b) Bearer token in Authorization header
	if let Some(raw) = bearer_token(req) {
		if let Some(record) = sources.lookup_api_token(&raw).await {
			return ExtractedPrincipal {
				principal: Principal::ApiToken(record),
				auth_method: Some("api_token"),
			};
		}
	}

	// (c) Query-string token, protocol-upgrade requests only
	if req.method() == Method::GET && is_upgrade_request(req) {
		if let Some(raw) = query_param(req, "token") {
			if let Some(record) = sources.lookup_api_token(&raw).await {
				return ExtractedPrincipal {
					principal: Principal::ApiToken(record),
					auth_method: Some("api_token"),
				};
			}
		}
	}

	// (d) Session cookie
	if let Some(raw) = cookie(req, "pulse_session") {
		if let Some(principal) = sources.lookup_session(&raw).await {
			return ExtractedPrincipal {
				principal,
				auth_method: Some("session"),
			};
		}
	}

	// (e) Proxy-auth shared secret header (+ optional user/role headers)
	if let Some(principal) = sources.lookup_proxy(req.headers()).await {
		return ExtractedPrincipal {
			principal,
			auth_method: Some("proxy"),
		};
	}

	// (f) OIDC id-token cookie
	if let Some(raw) = cookie(req, "pulse_oidc_id_token") {
		if let Some(principal) = sources.lookup_oidc(&raw).await {
			return ExtractedPrincipal {
				principal,
				auth_method: Some("oidc"),
			};
		}
	}

	ExtractedPrincipal {
		principal: Principal::Anonymous,
		auth_method: None,
	}
}
