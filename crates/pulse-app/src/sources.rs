use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use pulse::authn::extract::PrincipalSources;
use pulse::authn::oidc::JwksValidator;
use pulse::config::AuthMode;
use pulse::principal::{ApiTokenRecord, Principal, verify_api_token};
use pulse::session::SessionStore;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

/// Process-wide `PrincipalSources` wiring the session store, an in-memory
/// API-token table (loaded from the org token files at startup), and the
/// proxy/OIDC config into one implementation (spec.md §4.1).
pub struct AppPrincipalSources {
	sessions: SessionStore,
	api_tokens: RwLock<HashMap<String, ApiTokenRecord>>,
	auth_mode: Arc<AuthMode>,
	oidc_validator: Option<Arc<JwksValidator>>,
}

impl AppPrincipalSources {
	pub fn new(sessions: SessionStore, auth_mode: Arc<AuthMode>, oidc_validator: Option<Arc<JwksValidator>>) -> Self {
		Self {
			sessions,
			api_tokens: RwLock::new(HashMap::new()),
			auth_mode,
			oidc_validator,
		}
	}

	/// Replaces the in-memory token table wholesale; called on startup and
	/// whenever the admin token-management surface persists a change.
	pub async fn reload_tokens(&self, tokens: Vec<ApiTokenRecord>) {
		let mut write = self.api_tokens.write().await;
		write.clear();
		for token in tokens {
			write.insert(token.id.clone(), token);
		}
	}
}

#[async_trait]
impl PrincipalSources for AppPrincipalSources {
	async fn lookup_api_token(&self, raw: &SecretString) -> Option<ApiTokenRecord> {
		let tokens = self.api_tokens.read().await;
		tokens.values().find(|record| verify_api_token(raw, &record.hash)).cloned()
	}

	async fn lookup_session(&self, raw_cookie: &SecretString) -> Option<Principal> {
		let session = self.sessions.validate(raw_cookie, chrono::Utc::now()).await.ok()??;
		Some(Principal::User(pulse::principal::User {
			id: session.user_id,
			display_name: String::new(),
			roles: vec![],
		}))
	}

	async fn lookup_proxy(&self, headers: &HeaderMap) -> Option<Principal> {
		let AuthMode::Proxy {
			secret_header,
			user_header,
			role_header,
			admin_roles,
			role_separator,
		} = self.auth_mode.as_ref()
		else {
			return None;
		};

		headers.get(secret_header.as_str())?;
		let user = headers.get(user_header.as_str())?.to_str().ok()?.to_string();
		let is_admin = role_header
			.as_ref()
			.and_then(|header_name| headers.get(header_name.as_str()))
			.and_then(|v| v.to_str().ok())
			.map(|roles| roles.split(role_separator.as_str()).any(|r| admin_roles.iter().any(|a| a == r)))
			.unwrap_or(false);

		Some(Principal::Proxy { user, is_admin })
	}

	async fn lookup_oidc(&self, raw_cookie: &SecretString) -> Option<Principal> {
		let validator = self.oidc_validator.as_ref()?;
		let claims = validator.validate(raw_cookie.expose_secret()).ok()?;
		Some(Principal::Oidc {
			subject: claims.subject,
			email: claims.email,
		})
	}
}
