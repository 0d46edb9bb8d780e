use std::collections::HashSet;

use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version, password_hash::{PasswordHasher, SaltString, rand_core::OsRng}};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Which orgs an API token may resolve to (spec.md §3, Invariant I3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OrgBinding {
	Single { org_id: String },
	Set { org_ids: HashSet<String> },
	/// Legacy wildcard scope. Any use is logged as deprecated (spec.md §4.4).
	Wildcard,
}

impl OrgBinding {
	pub fn permits(&self, org_id: &str) -> bool {
		match self {
			OrgBinding::Single { org_id: o } => o == org_id,
			OrgBinding::Set { org_ids } => org_ids.contains(org_id),
			OrgBinding::Wildcard => true,
		}
	}

	/// The single org this binding pins to, if any - used by the tenant
	/// resolver's token-promotion step (spec.md §4.5).
	pub fn sole_org(&self) -> Option<&str> {
		match self {
			OrgBinding::Single { org_id } => Some(org_id),
			OrgBinding::Set { org_ids } if org_ids.len() == 1 => org_ids.iter().next().map(|s| s.as_str()),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
	Owner,
	Admin,
	Editor,
	Viewer,
}

/// A record of an issued API token, as persisted. The raw token is never
/// stored; `hash` is a salted hash produced at issuance time (see
/// `session::hashing`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTokenRecord {
	pub id: String,
	pub label: String,
	pub hash: String,
	pub scopes: HashSet<String>,
	pub org_binding: OrgBinding,
	pub host_id: Option<String>,
	#[serde(default)]
	pub metadata: std::collections::BTreeMap<String, String>,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiTokenRecord {
	/// Legacy tokens carry the catch-all `"*"` scope and a wildcard org binding.
	pub fn is_legacy(&self) -> bool {
		self.scopes.contains("*") && matches!(self.org_binding, OrgBinding::Wildcard)
	}

	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.contains("*") || self.scopes.contains(scope)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: String,
	pub display_name: String,
	pub roles: Vec<Role>,
}

/// Exactly one principal is attached to a request context (Invariant I1).
#[derive(Debug, Clone)]
pub enum Principal {
	Anonymous,
	User(User),
	ApiToken(ApiTokenRecord),
	/// A proxy-asserted identity: shared-secret header plus optional user/role headers.
	Proxy { user: String, is_admin: bool },
	/// An OIDC-authenticated identity, represented after local session exchange.
	Oidc { subject: String, email: Option<String> },
}

impl Principal {
	pub fn auth_method(&self) -> Option<&'static str> {
		match self {
			Principal::Anonymous => None,
			Principal::User(_) => Some("session"),
			Principal::ApiToken(_) => Some("api_token"),
			Principal::Proxy { .. } => Some("proxy"),
			Principal::Oidc { .. } => Some("oidc"),
		}
	}

	pub fn is_authenticated(&self) -> bool {
		!matches!(self, Principal::Anonymous)
	}
}

/// A raw bearer/session token in flight. Never `Debug`/`Display` this; it
/// exists only to be hashed and compared.
#[derive(Clone)]
pub struct RawToken(pub SecretString);

// Explicit Argon2id parameters, matching the cost the teacher's PAT hashing
// uses: memory-hard enough to resist offline cracking of a leaked hash file
// without making issuance/verification noticeably slow.
const ARGON2_M_COST: u32 = 19_456;
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;

fn argon2_instance() -> Argon2<'static> {
	let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None).expect("valid argon2 params");
	Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Hashes a freshly issued API token with argon2 - low-volume and
/// long-lived, unlike session tokens (see `session::hash_token`'s fast-hash
/// rationale), so the stronger, slower KDF is worth the cost here.
pub fn hash_api_token(raw: &SecretString) -> anyhow::Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = argon2_instance()
		.hash_password(raw.expose_secret().as_bytes(), &salt)
		.map_err(|err| anyhow::anyhow!("argon2 hash error: {err}"))?;
	Ok(hash.to_string())
}

pub fn verify_api_token(raw: &SecretString, stored_hash: &str) -> bool {
	let Ok(parsed) = PasswordHash::new(stored_hash) else {
		return false;
	};
	argon2_instance().verify_password(raw.expose_secret().as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod token_hash_tests {
	use super::*;

	#[test]
	fn hash_round_trips_through_verify() {
		let raw = SecretString::new("tok-abc123".to_string().into());
		let hash = hash_api_token(&raw).unwrap();
		assert!(verify_api_token(&raw, &hash));
		assert!(!verify_api_token(&SecretString::new("wrong".to_string().into()), &hash));
	}
}
