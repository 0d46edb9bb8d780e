use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::principal::Role;

/// The legacy default org slug - always-accessible, exempt from rate
/// limiting (spec.md I2, I7).
pub const DEFAULT_ORG_ID: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgStatus {
	Active,
	Suspended,
	PendingDeletion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
	pub user_id: String,
	pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
	/// Filesystem-safe slug; also the directory name under the data root.
	pub id: String,
	pub display_name: String,
	pub owner_user_id: String,
	pub created_at: DateTime<Utc>,
	pub status: OrgStatus,
	pub suspended_at: Option<DateTime<Utc>>,
	pub deletion_requested_at: Option<DateTime<Utc>>,
	pub members: Vec<Membership>,
}

impl Organization {
	pub fn is_default(&self) -> bool {
		self.id == DEFAULT_ORG_ID
	}

	pub fn member_role(&self, user_id: &str) -> Option<&Role> {
		self.members.iter().find(|m| m.user_id == user_id).map(|m| &m.role)
	}

	/// Whether the lifecycle status currently admits traffic (spec.md §4.5).
	pub fn is_accessible(&self) -> bool {
		matches!(self.status, OrgStatus::Active)
	}
}

/// A filesystem-safe slug: lowercase ascii alphanumerics, `-` and `_`, no
/// path separators or leading dot. Used to validate `X-Pulse-Org-ID`
/// *before* it is ever joined onto a filesystem path.
pub fn is_valid_org_slug(candidate: &str) -> bool {
	if candidate.is_empty() || candidate.len() > 64 {
		return false;
	}
	if candidate == "." || candidate == ".." {
		return false;
	}
	candidate
		.bytes()
		.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_path_traversal() {
		assert!(!is_valid_org_slug("../bad"));
		assert!(!is_valid_org_slug("a/b"));
		assert!(!is_valid_org_slug(".."));
		assert!(!is_valid_org_slug(""));
	}

	#[test]
	fn accepts_normal_slugs() {
		assert!(is_valid_org_slug("acme"));
		assert!(is_valid_org_slug("acme-corp_1"));
		assert!(is_valid_org_slug(DEFAULT_ORG_ID));
	}
}
