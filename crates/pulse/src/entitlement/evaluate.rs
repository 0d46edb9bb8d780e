use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use pulse_core::Clock;
use serde::{Deserialize, Serialize};

/// Signed-JWT-derived license state, or absent entirely.
#[derive(Debug, Clone)]
pub struct LicenseStatus {
	pub valid: bool,
	pub in_grace: bool,
	pub expires_at: DateTime<Utc>,
	pub features: HashSet<String>,
	pub limits: BTreeMap<String, u64>,
}

/// Per-org billing file contents. Authoritative over license where present.
#[derive(Debug, Clone, Default)]
pub struct BillingState {
	pub subscription_state: Option<String>,
	pub capabilities: HashSet<String>,
	pub limits: BTreeMap<String, u64>,
	pub trial_started_at: Option<DateTime<Utc>>,
	pub trial_ends_at: Option<DateTime<Utc>>,
}

/// Current resource counts, read from the runtime monitor.
#[derive(Debug, Clone, Default)]
pub struct UsageSnapshot {
	pub current: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitState {
	Ok,
	Warning,
	Enforced,
}

/// `0` means unlimited, per spec.md §4.7.
fn limit_state(limit: u64, current: u64) -> LimitState {
	if limit == 0 {
		return LimitState::Ok;
	}
	if current >= limit {
		return LimitState::Enforced;
	}
	// current < 90% of limit <=> current * 10 < limit * 9
	if (current as u128) * 10 < (limit as u128) * 9 {
		LimitState::Ok
	} else {
		LimitState::Warning
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitEntry {
	pub limit: u64,
	pub current: u64,
	pub state: LimitState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeReason {
	pub key: String,
	pub message: String,
	pub action_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementPayload {
	pub subscription_state: String,
	pub capabilities: Vec<String>,
	pub limits: BTreeMap<String, LimitEntry>,
	pub trial_days_remaining: Option<u64>,
	pub trial_eligible: bool,
	pub trial_eligibility_reason: Option<&'static str>,
	pub upgrade_reasons: Vec<UpgradeReason>,
}

impl EntitlementPayload {
	pub fn has_capability(&self, capability: &str) -> bool {
		self.capabilities.iter().any(|c| c == capability)
	}
}

fn derive_subscription_state(billing: &BillingState, license: Option<&LicenseStatus>) -> String {
	if let Some(state) = &billing.subscription_state {
		return state.clone();
	}
	match license {
		// No license on file at all means a fresh install, not an expired one.
		None => "trial".to_string(),
		Some(l) if l.valid && l.in_grace => "grace".to_string(),
		Some(l) if l.valid => "active".to_string(),
		Some(_) => "expired".to_string(),
	}
}

/// Features belonging to the tier immediately above the org's current
/// capability set, used to compute `upgrade_reasons`. The catalog is a
/// simple ordered list of (tier, required-feature) pairs; callers pass the
/// slice relevant to their deployment (self-hosted vs hosted tiers differ).
pub struct TierCatalogEntry {
	pub feature: &'static str,
	pub message: &'static str,
	pub action_url: &'static str,
}

fn compute_upgrade_reasons(capabilities: &HashSet<String>, next_tier: &[TierCatalogEntry]) -> Vec<UpgradeReason> {
	next_tier
		.iter()
		.filter(|entry| !capabilities.contains(entry.feature))
		.map(|entry| UpgradeReason {
			key: entry.feature.to_string(),
			message: entry.message.to_string(),
			action_url: entry.action_url.to_string(),
		})
		.collect()
}

/// Pure evaluation of (license, billing, usage, clock) into the public
/// entitlement payload (spec.md §4.7). No I/O: callers snapshot-read the
/// license/billing state via `pulse_core::Snapshot` before calling this.
pub fn evaluate(
	license: Option<&LicenseStatus>,
	billing: &BillingState,
	usage: &UsageSnapshot,
	clock: &dyn Clock,
	next_tier: &[TierCatalogEntry],
) -> EntitlementPayload {
	let subscription_state = derive_subscription_state(billing, license);

	let mut capabilities: HashSet<String> = billing.capabilities.clone();
	if let Some(l) = license {
		capabilities.extend(l.features.iter().cloned());
	}

	let mut merged_limits: BTreeMap<String, u64> = BTreeMap::new();
	if let Some(l) = license {
		merged_limits.extend(l.limits.clone());
	}
	merged_limits.extend(billing.limits.clone());

	let limits: BTreeMap<String, LimitEntry> = merged_limits
		.into_iter()
		.map(|(key, limit)| {
			let current = usage.current.get(&key).copied().unwrap_or(0);
			let state = limit_state(limit, current);
			(key, LimitEntry { limit, current, state })
		})
		.collect();

	let trial_ends_at = billing.trial_ends_at.or_else(|| license.map(|l| l.expires_at));
	let trial_days_remaining = trial_ends_at.map(|ends_at| {
		let remaining_secs = (ends_at - clock.now()).num_seconds();
		if remaining_secs <= 0 {
			0
		} else {
			// ceiling division by a day, per spec.md §4.7.
			((remaining_secs + 86_399) / 86_400) as u64
		}
	});

	let (trial_eligible, trial_eligibility_reason) = match billing.trial_started_at {
		Some(_) => (false, Some("already_used")),
		None => (true, None),
	};

	let mut capabilities_vec: Vec<String> = capabilities.iter().cloned().collect();
	capabilities_vec.sort();

	EntitlementPayload {
		subscription_state,
		capabilities: capabilities_vec,
		limits,
		trial_days_remaining,
		trial_eligible,
		trial_eligibility_reason,
		upgrade_reasons: compute_upgrade_reasons(&capabilities, next_tier),
	}
}

#[cfg(test)]
mod tests {
	use pulse_core::clock::FixedClock;

	use super::*;

	fn clock_at(secs: i64) -> FixedClock {
		FixedClock(DateTime::from_timestamp(secs, 0).unwrap())
	}

	#[test]
	fn absent_license_and_billing_yields_trial_and_empty_capabilities() {
		let payload = evaluate(None, &BillingState::default(), &UsageSnapshot::default(), &clock_at(0), &[]);
		assert_eq!(payload.subscription_state, "trial");
		assert!(payload.capabilities.is_empty());
	}

	#[test]
	fn invalid_license_with_no_billing_state_yields_expired() {
		let license = LicenseStatus {
			valid: false,
			in_grace: false,
			expires_at: Utc::now(),
			features: Default::default(),
			limits: Default::default(),
		};
		let payload = evaluate(Some(&license), &BillingState::default(), &UsageSnapshot::default(), &clock_at(0), &[]);
		assert_eq!(payload.subscription_state, "expired");
	}

	#[test]
	fn billing_subscription_state_overrides_license_derivation() {
		let billing = BillingState {
			subscription_state: Some("active".to_string()),
			..Default::default()
		};
		let license = LicenseStatus {
			valid: false,
			in_grace: false,
			expires_at: Utc::now(),
			features: Default::default(),
			limits: Default::default(),
		};
		let payload = evaluate(Some(&license), &billing, &UsageSnapshot::default(), &clock_at(0), &[]);
		assert_eq!(payload.subscription_state, "active");
	}

	#[test]
	fn limit_states_follow_the_ninety_percent_thresholds() {
		assert_eq!(limit_state(0, 1_000_000), LimitState::Ok);
		assert_eq!(limit_state(100, 89), LimitState::Ok);
		assert_eq!(limit_state(100, 90), LimitState::Warning);
		assert_eq!(limit_state(100, 100), LimitState::Enforced);
		assert_eq!(limit_state(100, 150), LimitState::Enforced);
	}

	#[test]
	fn billing_limit_overrides_license_limit() {
		let license = LicenseStatus {
			valid: true,
			in_grace: false,
			expires_at: Utc::now(),
			features: Default::default(),
			limits: BTreeMap::from([("nodes".to_string(), 5)]),
		};
		let billing = BillingState {
			limits: BTreeMap::from([("nodes".to_string(), 20)]),
			..Default::default()
		};
		let payload = evaluate(Some(&license), &billing, &UsageSnapshot::default(), &clock_at(0), &[]);
		assert_eq!(payload.limits["nodes"].limit, 20);
	}

	#[test]
	fn trial_days_remaining_ceils_and_floors_at_zero() {
		let now = clock_at(0);
		let billing = BillingState {
			trial_ends_at: Some(now.now() + chrono::Duration::seconds(86_401)),
			..Default::default()
		};
		let payload = evaluate(None, &billing, &UsageSnapshot::default(), &now, &[]);
		assert_eq!(payload.trial_days_remaining, Some(2));

		let expired_billing = BillingState {
			trial_ends_at: Some(now.now() - chrono::Duration::seconds(10)),
			..Default::default()
		};
		let payload = evaluate(None, &expired_billing, &UsageSnapshot::default(), &now, &[]);
		assert_eq!(payload.trial_days_remaining, Some(0));
	}

	#[test]
	fn trial_eligibility_reflects_prior_trial_record() {
		let fresh = evaluate(None, &BillingState::default(), &UsageSnapshot::default(), &clock_at(0), &[]);
		assert!(fresh.trial_eligible);
		assert!(fresh.trial_eligibility_reason.is_none());

		let used = BillingState {
			trial_started_at: Some(Utc::now()),
			..Default::default()
		};
		let payload = evaluate(None, &used, &UsageSnapshot::default(), &clock_at(0), &[]);
		assert!(!payload.trial_eligible);
		assert_eq!(payload.trial_eligibility_reason, Some("already_used"));
	}

	#[test]
	fn upgrade_reasons_are_the_set_difference_of_the_next_tier() {
		let billing = BillingState {
			capabilities: ["ai_chat".to_string()].into_iter().collect(),
			..Default::default()
		};
		let next_tier = [
			TierCatalogEntry {
				feature: "ai_chat",
				message: "already have it",
				action_url: "/upgrade",
			},
			TierCatalogEntry {
				feature: "multi_tenant",
				message: "Upgrade for multi-tenant support",
				action_url: "/upgrade",
			},
		];
		let payload = evaluate(None, &billing, &UsageSnapshot::default(), &clock_at(0), &next_tier);
		assert_eq!(payload.upgrade_reasons.len(), 1);
		assert_eq!(payload.upgrade_reasons[0].key, "multi_tenant");
	}
}
