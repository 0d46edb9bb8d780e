use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::error::CoreError;
use crate::org::{DEFAULT_ORG_ID, Organization, OrgStatus, is_valid_org_slug};
use crate::principal::Principal;

pub const ORG_HEADER: &str = "X-Pulse-Org-ID";

/// Read-only probe over the org directory. Implementations MUST NOT create
/// anything on lookup - `resolve_effective_org` relies on that to avoid
/// storage inflation from a malicious org-id guess (spec.md §4.5).
#[async_trait]
pub trait OrgDirectory: Send + Sync {
	async fn lookup(&self, org_id: &str) -> Option<Organization>;
}

fn default_org_stub() -> Organization {
	Organization {
		id: DEFAULT_ORG_ID.to_string(),
		display_name: "Default".to_string(),
		owner_user_id: String::new(),
		created_at: chrono::Utc::now(),
		status: OrgStatus::Active,
		suspended_at: None,
		deletion_requested_at: None,
		members: vec![],
	}
}

fn header_org(headers: &HeaderMap) -> Option<String> {
	headers
		.get(ORG_HEADER)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
}

/// The 4-step effective-org resolution of spec.md §4.5. `cookie_org_id` is
/// already-extracted tenant-cookie content, if any; callers get it from the
/// request's `Cookie` header themselves (see `authn::extract::cookie`).
pub async fn resolve_effective_org(
	headers: &HeaderMap,
	cookie_org_id: Option<&str>,
	principal: &Principal,
	directory: &dyn OrgDirectory,
) -> Result<Organization, CoreError> {
	let explicit = header_org(headers).or_else(|| cookie_org_id.map(str::to_string));
	let mut effective = explicit.clone().unwrap_or_else(|| DEFAULT_ORG_ID.to_string());

	if effective == DEFAULT_ORG_ID && explicit.is_none() {
		if let Principal::ApiToken(token) = principal {
			if let Some(sole) = token.org_binding.sole_org() {
				effective = sole.to_string();
			}
		}
	}

	if effective == DEFAULT_ORG_ID {
		return Ok(directory.lookup(DEFAULT_ORG_ID).await.unwrap_or_else(default_org_stub));
	}

	if !is_valid_org_slug(&effective) {
		return Err(CoreError::InvalidOrg(effective));
	}

	let org = directory
		.lookup(&effective)
		.await
		.ok_or_else(|| CoreError::InvalidOrg(effective.clone()))?;

	if !org.is_accessible() {
		return Err(CoreError::OrgSuspended);
	}

	Ok(org)
}

#[cfg(test)]
mod tests {
	use axum::http::HeaderValue;

	use super::*;
	use crate::principal::{ApiTokenRecord, OrgBinding};

	struct FixedDirectory(Vec<Organization>);

	#[async_trait]
	impl OrgDirectory for FixedDirectory {
		async fn lookup(&self, org_id: &str) -> Option<Organization> {
			self.0.iter().find(|o| o.id == org_id).cloned()
		}
	}

	fn org(id: &str, status: OrgStatus) -> Organization {
		Organization {
			id: id.to_string(),
			display_name: id.to_string(),
			owner_user_id: "owner".into(),
			created_at: chrono::Utc::now(),
			status,
			suspended_at: None,
			deletion_requested_at: None,
			members: vec![],
		}
	}

	#[tokio::test]
	async fn header_wins_and_is_validated_against_directory() {
		let directory = FixedDirectory(vec![org("acme", OrgStatus::Active)]);
		let mut headers = HeaderMap::new();
		headers.insert(ORG_HEADER, HeaderValue::from_static("acme"));
		let resolved = resolve_effective_org(&headers, None, &Principal::Anonymous, &directory)
			.await
			.unwrap();
		assert_eq!(resolved.id, "acme");
	}

	#[tokio::test]
	async fn unknown_org_is_rejected_without_directory_creation() {
		let directory = FixedDirectory(vec![]);
		let mut headers = HeaderMap::new();
		headers.insert(ORG_HEADER, HeaderValue::from_static("ghost"));
		let err = resolve_effective_org(&headers, None, &Principal::Anonymous, &directory)
			.await
			.unwrap_err();
		assert!(matches!(err, CoreError::InvalidOrg(id) if id == "ghost"));
	}

	#[tokio::test]
	async fn path_traversal_slug_is_rejected_before_any_lookup() {
		let directory = FixedDirectory(vec![]);
		let mut headers = HeaderMap::new();
		headers.insert(ORG_HEADER, HeaderValue::from_static("../etc"));
		let err = resolve_effective_org(&headers, None, &Principal::Anonymous, &directory)
			.await
			.unwrap_err();
		assert!(matches!(err, CoreError::InvalidOrg(_)));
	}

	#[tokio::test]
	async fn suspended_org_is_forbidden() {
		let directory = FixedDirectory(vec![org("acme", OrgStatus::Suspended)]);
		let mut headers = HeaderMap::new();
		headers.insert(ORG_HEADER, HeaderValue::from_static("acme"));
		let err = resolve_effective_org(&headers, None, &Principal::Anonymous, &directory)
			.await
			.unwrap_err();
		assert!(matches!(err, CoreError::OrgSuspended));
	}

	#[tokio::test]
	async fn sole_bound_token_promotes_its_org_when_nothing_explicit() {
		let directory = FixedDirectory(vec![org("acme", OrgStatus::Active)]);
		let headers = HeaderMap::new();
		let token = Principal::ApiToken(ApiTokenRecord {
			id: "t1".into(),
			label: "l".into(),
			hash: "h".into(),
			scopes: Default::default(),
			org_binding: OrgBinding::Single { org_id: "acme".into() },
			host_id: None,
			metadata: Default::default(),
			created_at: chrono::Utc::now(),
			last_used_at: None,
		});
		let resolved = resolve_effective_org(&headers, None, &token, &directory).await.unwrap();
		assert_eq!(resolved.id, "acme");
	}

	#[tokio::test]
	async fn no_selection_and_no_binding_falls_back_to_default() {
		let directory = FixedDirectory(vec![]);
		let headers = HeaderMap::new();
		let resolved = resolve_effective_org(&headers, None, &Principal::Anonymous, &directory)
			.await
			.unwrap();
		assert_eq!(resolved.id, DEFAULT_ORG_ID);
	}
}
