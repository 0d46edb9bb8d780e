use std::collections::HashMap;
use std::path::PathBuf;

use pulse::entitlement::evaluate::{BillingState, UsageSnapshot};
use pulse_core::Snapshot;
use tokio::sync::RwLock;

/// Per-org billing state, snapshot-read so entitlement evaluation never
/// blocks on the same lock a concurrent reload would take (spec.md §5:
/// "Entitlement reads are eventually consistent with billing-state writes").
///
/// License-signature verification is out of scope here (see DESIGN.md):
/// billing state is read as plain JSON rather than a signed JWT, so
/// `evaluate()` is always called with `license: None` in this binary.
pub struct OrgEntitlementStore {
	data_dir: PathBuf,
	snapshots: RwLock<HashMap<String, std::sync::Arc<Snapshot<BillingState>>>>,
}

impl OrgEntitlementStore {
	pub fn new(data_dir: PathBuf) -> Self {
		Self {
			data_dir,
			snapshots: RwLock::new(HashMap::new()),
		}
	}

	fn billing_file(&self, org_id: &str) -> PathBuf {
		self.data_dir.join("orgs").join(org_id).join("billing.json")
	}

	async fn read_from_disk(&self, org_id: &str) -> BillingState {
		let Ok(raw) = tokio::fs::read(self.billing_file(org_id)).await else {
			return BillingState::default();
		};
		serde_json::from_slice::<DiskBillingState>(&raw).map(Into::into).unwrap_or_default()
	}

	/// Returns the cached snapshot for `org_id`, populating it from disk on
	/// first access. Call [`Self::reload`] to pick up a later write.
	pub async fn get(&self, org_id: &str) -> std::sync::Arc<Snapshot<BillingState>> {
		if let Some(snap) = self.snapshots.read().await.get(org_id) {
			return snap.clone();
		}
		let state = self.read_from_disk(org_id).await;
		let mut write = self.snapshots.write().await;
		write.entry(org_id.to_string()).or_insert_with(|| std::sync::Arc::new(Snapshot::new(state))).clone()
	}

	/// Re-reads `<data_dir>/orgs/<id>/billing.json` and atomically swaps the
	/// snapshot pointer; in-flight reads keep whatever `Arc` they already
	/// loaded.
	pub async fn reload(&self, org_id: &str) {
		let state = self.read_from_disk(org_id).await;
		let snap = self.get(org_id).await;
		snap.store(state);
	}

	/// Persists `state` to `<data_dir>/orgs/<id>/billing.json` and swaps the
	/// in-memory snapshot to match, so the caller's own next read observes
	/// the write (spec.md §5's eventual-consistency note only binds *other*
	/// concurrent readers, not the writer itself).
	pub async fn write(&self, org_id: &str, state: BillingState) -> anyhow::Result<()> {
		let path = self.billing_file(org_id);
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let on_disk = DiskBillingState::from(&state);
		tokio::fs::write(&path, serde_json::to_vec_pretty(&on_disk)?).await?;

		let snap = self.get(org_id).await;
		snap.store(state);
		Ok(())
	}
}

/// Matches the on-disk JSON shape; kept distinct from `BillingState` so the
/// wire format can evolve independently of the evaluator's internal type.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DiskBillingState {
	pub subscription_state: Option<String>,
	#[serde(default)]
	pub capabilities: std::collections::HashSet<String>,
	#[serde(default)]
	pub limits: std::collections::BTreeMap<String, u64>,
	pub trial_started_at: Option<chrono::DateTime<chrono::Utc>>,
	pub trial_ends_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<DiskBillingState> for BillingState {
	fn from(d: DiskBillingState) -> Self {
		BillingState {
			subscription_state: d.subscription_state,
			capabilities: d.capabilities,
			limits: d.limits,
			trial_started_at: d.trial_started_at,
			trial_ends_at: d.trial_ends_at,
		}
	}
}

impl From<&BillingState> for DiskBillingState {
	fn from(b: &BillingState) -> Self {
		DiskBillingState {
			subscription_state: b.subscription_state.clone(),
			capabilities: b.capabilities.clone(),
			limits: b.limits.clone(),
			trial_started_at: b.trial_started_at,
			trial_ends_at: b.trial_ends_at,
		}
	}
}

pub fn empty_usage() -> UsageSnapshot {
	UsageSnapshot::default()
}

#[cfg(test)]
mod tests {
	use tempfile::tempdir;

	use super::*;

	#[tokio::test]
	async fn missing_billing_file_yields_default_state_without_creating_it() {
		let dir = tempdir().unwrap();
		let store = OrgEntitlementStore::new(dir.path().to_path_buf());
		let snap = store.get("acme").await;
		assert!(snap.load().subscription_state.is_none());
		assert!(!dir.path().join("orgs").join("acme").exists());
	}

	#[tokio::test]
	async fn reload_picks_up_a_later_write() {
		let dir = tempdir().unwrap();
		let org_dir = dir.path().join("orgs").join("acme");
		tokio::fs::create_dir_all(&org_dir).await.unwrap();
		let store = OrgEntitlementStore::new(dir.path().to_path_buf());
		let snap = store.get("acme").await;
		assert!(snap.load().subscription_state.is_none());

		tokio::fs::write(org_dir.join("billing.json"), br#"{"subscription_state": "active"}"#).await.unwrap();
		store.reload("acme").await;
		assert_eq!(snap.load().subscription_state.as_deref(), Some("active"));
	}

	#[tokio::test]
	async fn write_persists_to_disk_and_updates_the_live_snapshot() {
		let dir = tempdir().unwrap();
		let store = OrgEntitlementStore::new(dir.path().to_path_buf());
		let snap = store.get("acme").await;

		let state = BillingState {
			subscription_state: Some("active".to_string()),
			limits: std::collections::BTreeMap::from([("max_agents".to_string(), 25)]),
			..Default::default()
		};
		store.write("acme", state).await.unwrap();

		assert_eq!(snap.load().subscription_state.as_deref(), Some("active"));
		let raw = tokio::fs::read(dir.path().join("orgs").join("acme").join("billing.json")).await.unwrap();
		let on_disk: DiskBillingState = serde_json::from_slice(&raw).unwrap();
		assert_eq!(on_disk.limits["max_agents"], 25);
	}
}
