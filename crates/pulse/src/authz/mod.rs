//! C4 Authorization Checker: org access and action/resource checks.

use crate::org::Organization;
use crate::principal::{Principal, Role};

/// Returned verbatim to the caller so handlers/middleware can distinguish
/// "denied" from "not applicable" (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
	pub allowed: bool,
	pub reason: String,
	pub is_legacy_token: bool,
}

impl Decision {
	fn allow(reason: impl Into<String>) -> Self {
		Self {
			allowed: true,
			reason: reason.into(),
			is_legacy_token: false,
		}
	}

	fn deny(reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			reason: reason.into(),
			is_legacy_token: false,
		}
	}

	fn legacy(mut self) -> Self {
		self.is_legacy_token = true;
		self
	}
}

/// Whether `principal` may access `org`. `organization_loader_configured`
/// and `strict_default_membership` come from [`crate::config::Config`] and
/// together resolve the Open Question of spec.md §9: the legacy default org
/// always allows any authenticated principal *unless* strict membership has
/// been opted into for this deployment.
pub fn check_org_access(
	principal: &Principal,
	org: &Organization,
	organization_loader_configured: bool,
	strict_default_membership: bool,
) -> Decision {
	if let Principal::ApiToken(token) = principal {
		if !token.org_binding.permits(&org.id) {
			return Decision::deny(format!("token is not bound to org {:?}", org.id));
		}
		if token.is_legacy() {
			tracing::warn!(
				target = "audit",
				action = "authz.legacy_token_used",
				org_id = %org.id,
				"legacy wildcard-scoped API token used for org access"
			);
			return Decision::allow("legacy wildcard token").legacy();
		}
	}

	if org.is_default() && (!organization_loader_configured || !strict_default_membership) {
		return Decision::allow("legacy default org, membership not enforced");
	}

	match principal {
		Principal::User(user) => match org.member_role(&user.id) {
			Some(_role) => Decision::allow("org member"),
			None => Decision::deny("not a member of this organization"),
		},
		Principal::ApiToken(_) => Decision::allow("token binding already checked above"),
		Principal::Proxy { is_admin, .. } if *is_admin => Decision::allow("proxy-asserted admin"),
		_ => Decision::deny("no membership evidence for this principal"),
	}
}

/// Whether a role satisfies a required action. Higher roles satisfy every
/// action a lower role satisfies: `owner > admin > editor > viewer`.
fn role_rank(role: &Role) -> u8 {
	match role {
		Role::Owner => 3,
		Role::Admin => 2,
		Role::Editor => 1,
		Role::Viewer => 0,
	}
}

pub fn check_action(principal: &Principal, org: &Organization, required_role: Role) -> Decision {
	match principal {
		Principal::User(user) => match org.member_role(&user.id) {
			Some(role) if role_rank(role) >= role_rank(&required_role) => {
				Decision::allow(format!("role {role:?} satisfies required {required_role:?}"))
			},
			Some(role) => Decision::deny(format!("role {role:?} insufficient for {required_role:?}")),
			None => Decision::deny("not a member of this organization"),
		},
		Principal::ApiToken(token) => {
			if token.has_scope("*") || token.has_scope("write") {
				Decision::allow("token scope permits action")
			} else {
				Decision::deny("token scope insufficient")
			}
		},
		Principal::Proxy { is_admin, .. } => {
			if *is_admin {
				Decision::allow("proxy-asserted admin")
			} else {
				Decision::deny("proxy principal lacks admin role")
			}
		},
		_ => Decision::deny("unauthenticated principal"),
	}
}

#[cfg(test)]
mod tests {
	use chrono::Utc;

	use super::*;
	use crate::org::{DEFAULT_ORG_ID, OrgStatus};
	use crate::principal::{ApiTokenRecord, OrgBinding, User};

	fn org(id: &str) -> Organization {
		Organization {
			id: id.to_string(),
			display_name: id.to_string(),
			owner_user_id: "owner".into(),
			created_at: Utc::now(),
			status: OrgStatus::Active,
			suspended_at: None,
			deletion_requested_at: None,
			members: vec![],
		}
	}

	#[test]
	fn default_org_always_allowed_without_strict_membership() {
		let decision = check_org_access(&Principal::Anonymous, &org(DEFAULT_ORG_ID), true, false);
		assert!(decision.allowed);
	}

	#[test]
	fn default_org_enforces_membership_when_strict() {
		let user = Principal::User(User {
			id: "u1".into(),
			display_name: "A".into(),
			roles: vec![],
		});
		let decision = check_org_access(&user, &org(DEFAULT_ORG_ID), true, true);
		assert!(!decision.allowed);
	}

	#[test]
	fn token_bound_to_other_org_is_denied() {
		let token = Principal::ApiToken(ApiTokenRecord {
			id: "t1".into(),
			label: "l".into(),
			hash: "h".into(),
			scopes: Default::default(),
			org_binding: OrgBinding::Single { org_id: "other".into() },
			host_id: None,
			metadata: Default::default(),
			created_at: Utc::now(),
			last_used_at: None,
		});
		let decision = check_org_access(&token, &org("acme"), true, true);
		assert!(!decision.allowed);
	}

	#[test]
	fn wildcard_legacy_token_is_allowed_and_flagged() {
		let token = Principal::ApiToken(ApiTokenRecord {
			id: "t1".into(),
			label: "l".into(),
			hash: "h".into(),
			scopes: ["*".to_string()].into_iter().collect(),
			org_binding: OrgBinding::Wildcard,
			host_id: None,
			metadata: Default::default(),
			created_at: Utc::now(),
			last_used_at: None,
		});
		let decision = check_org_access(&token, &org("acme"), true, true);
		assert!(decision.allowed);
		assert!(decision.is_legacy_token);
	}
}
