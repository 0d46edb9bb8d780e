use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pulse::org::Organization;
use pulse::tenant::resolve::OrgDirectory;

/// Probes `<data_dir>/orgs/<id>/org.json` without ever creating it - the
/// spec's explicit warning against a blind `mkdir`-then-check (spec.md
/// §4.5, SPEC_FULL.md §C.4).
pub struct FsOrgDirectory {
	orgs_root: PathBuf,
}

impl FsOrgDirectory {
	pub fn new(data_dir: &Path) -> Self {
		Self {
			orgs_root: data_dir.join("orgs"),
		}
	}

	fn org_file(&self, org_id: &str) -> PathBuf {
		self.orgs_root.join(org_id).join("org.json")
	}

	/// Lists every org with a parseable `org.json`, for the hosted-mode-only
	/// admin org listing (spec.md §6). Unlike [`Self::lookup`], a missing
	/// `orgs/` directory is simply an empty result, not a condition to create.
	pub async fn list_all(&self) -> anyhow::Result<Vec<Organization>> {
		let mut orgs = Vec::new();
		let mut entries = match tokio::fs::read_dir(&self.orgs_root).await {
			Ok(entries) => entries,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(orgs),
			Err(err) => return Err(err.into()),
		};
		while let Some(entry) = entries.next_entry().await? {
			if !entry.file_type().await?.is_dir() {
				continue;
			}
			if let Some(name) = entry.file_name().to_str() {
				if let Some(org) = self.lookup(name).await {
					orgs.push(org);
				}
			}
		}
		Ok(orgs)
	}
}

#[async_trait]
impl OrgDirectory for FsOrgDirectory {
	async fn lookup(&self, org_id: &str) -> Option<Organization> {
		let path = self.org_file(org_id);
		let raw = tokio::fs::read(&path).await.ok()?;
		serde_json::from_slice(&raw).ok()
	}
}

#[cfg(test)]
mod tests {
	use pulse::org::{DEFAULT_ORG_ID, OrgStatus};
	use tempfile::tempdir;

	use super::*;

	#[tokio::test]
	async fn missing_org_directory_is_not_created_by_a_lookup() {
		let dir = tempdir().unwrap();
		let directory = FsOrgDirectory::new(dir.path());
		assert!(directory.lookup("ghost").await.is_none());
		assert!(!dir.path().join("orgs").join("ghost").exists());
	}

	#[tokio::test]
	async fn existing_org_file_is_parsed() {
		let dir = tempdir().unwrap();
		let org_dir = dir.path().join("orgs").join(DEFAULT_ORG_ID);
		tokio::fs::create_dir_all(&org_dir).await.unwrap();
		let org = Organization {
			id: DEFAULT_ORG_ID.to_string(),
			display_name: "Default".to_string(),
			owner_user_id: "owner".to_string(),
			created_at: chrono::Utc::now(),
			status: OrgStatus::Active,
			suspended_at: None,
			deletion_requested_at: None,
			members: vec![],
		};
		tokio::fs::write(org_dir.join("org.json"), serde_json::to_vec(&org).unwrap())
			.await
			.unwrap();

		let directory = FsOrgDirectory::new(dir.path());
		let found = directory.lookup(DEFAULT_ORG_ID).await.unwrap();
		assert_eq!(found.id, DEFAULT_ORG_ID);
	}

	#[tokio::test]
	async fn list_all_is_empty_without_creating_the_orgs_directory() {
		let dir = tempdir().unwrap();
		let directory = FsOrgDirectory::new(dir.path());
		assert!(directory.list_all().await.unwrap().is_empty());
		assert!(!dir.path().join("orgs").exists());
	}

	#[tokio::test]
	async fn list_all_finds_every_org_with_a_parseable_org_json() {
		let dir = tempdir().unwrap();
		for id in ["acme", "beta"] {
			let org_dir = dir.path().join("orgs").join(id);
			tokio::fs::create_dir_all(&org_dir).await.unwrap();
			let org = Organization {
				id: id.to_string(),
				display_name: id.to_string(),
				owner_user_id: "owner".to_string(),
				created_at: chrono::Utc::now(),
				status: OrgStatus::Active,
				suspended_at: None,
				deletion_requested_at: None,
				members: vec![],
			};
			tokio::fs::write(org_dir.join("org.json"), serde_json::to_vec(&org).unwrap()).await.unwrap();
		}

		let directory = FsOrgDirectory::new(dir.path());
		let mut found: Vec<String> = directory.list_all().await.unwrap().into_iter().map(|o| o.id).collect();
		found.sort();
		assert_eq!(found, vec!["acme".to_string(), "beta".to_string()]);
	}
}
