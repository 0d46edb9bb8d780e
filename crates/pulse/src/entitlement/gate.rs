use crate::error::CoreError;

use super::evaluate::EntitlementPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
	Allowed,
	/// Capability absent; a read endpoint should return an empty/placeholder
	/// body instead of erroring, to keep the UI functional.
	Empty,
}

/// **Require** outcome of spec.md §4.8: a handler requires `capability`;
/// its absence is a 402 with `{feature, message, action_url}`.
pub fn require_capability(payload: &EntitlementPayload, capability: &'static str, action_url: Option<String>) -> Result<(), CoreError> {
	if payload.has_capability(capability) {
		Ok(())
	} else {
		Err(CoreError::LicenseRequired {
			feature: capability.to_string(),
			action_url,
		})
	}
}

/// **Gate empty** outcome: never errors, only tells the caller whether to
/// serve real data or a placeholder.
pub fn check_capability(payload: &EntitlementPayload, capability: &str) -> GateOutcome {
	if payload.has_capability(capability) {
		GateOutcome::Allowed
	} else {
		GateOutcome::Empty
	}
}

const ADMISSIBLE_HOSTED_STATES: [&str; 3] = ["active", "grace", "bounded_trial"];

/// **Hosted-subscription-required** outcome: in hosted mode, subscription
/// must be one of {active, grace, bounded_trial}. An unbounded trial (no
/// `trial_ends_at`) is refused outright, per spec.md §4.8.
pub fn check_hosted_subscription(payload: &EntitlementPayload, hosted_mode: bool) -> Result<(), CoreError> {
	if !hosted_mode {
		return Ok(());
	}
	if payload.subscription_state == "trial" && payload.trial_days_remaining.is_none() {
		return Err(CoreError::InvalidSubscriptionState("unbounded trial".to_string()));
	}
	if ADMISSIBLE_HOSTED_STATES.contains(&payload.subscription_state.as_str()) {
		Ok(())
	} else {
		Err(CoreError::SubscriptionRequired)
	}
}

/// Multi-tenant enablement has two independent axes (spec.md §4.8):
/// self-hosted needs the process-wide flag AND the `multi_tenant`
/// capability; hosted mode treats tenant routing as infrastructure and only
/// checks the subscription.
pub fn check_multi_tenant_enabled(payload: &EntitlementPayload, hosted_mode: bool, self_hosted_flag_enabled: bool) -> Result<(), CoreError> {
	if hosted_mode {
		return check_hosted_subscription(payload, hosted_mode);
	}
	if self_hosted_flag_enabled && payload.has_capability("multi_tenant") {
		Ok(())
	} else {
		Err(CoreError::LicenseRequired {
			feature: "multi_tenant".to_string(),
			action_url: None,
		})
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	fn payload(capabilities: &[&str], subscription_state: &str, trial_days_remaining: Option<u64>) -> EntitlementPayload {
		EntitlementPayload {
			subscription_state: subscription_state.to_string(),
			capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
			limits: BTreeMap::new(),
			trial_days_remaining,
			trial_eligible: true,
			trial_eligibility_reason: None,
			upgrade_reasons: vec![],
		}
	}

	#[test]
	fn require_capability_denies_absent_feature_with_details() {
		let p = payload(&[], "active", None);
		let err = require_capability(&p, "ai_chat", Some("/upgrade".to_string())).unwrap_err();
		assert!(matches!(err, CoreError::LicenseRequired { .. }));
	}

	#[test]
	fn gate_empty_never_errors() {
		let p = payload(&[], "active", None);
		assert_eq!(check_capability(&p, "ai_chat"), GateOutcome::Empty);
	}

	#[test]
	fn hosted_subscription_admits_active_grace_and_bounded_trial() {
		for state in ["active", "grace", "bounded_trial"] {
			let p = payload(&[], state, Some(3));
			assert!(check_hosted_subscription(&p, true).is_ok());
		}
	}

	#[test]
	fn hosted_subscription_rejects_expired() {
		let p = payload(&[], "expired", None);
		assert!(matches!(check_hosted_subscription(&p, true), Err(CoreError::SubscriptionRequired)));
	}

	#[test]
	fn unbounded_trial_is_refused() {
		let p = payload(&[], "trial", None);
		assert!(matches!(check_hosted_subscription(&p, true), Err(CoreError::InvalidSubscriptionState(_))));
	}

	#[test]
	fn self_hosted_mode_ignores_subscription_state_entirely() {
		let p = payload(&[], "expired", None);
		assert!(check_hosted_subscription(&p, false).is_ok());
	}

	#[test]
	fn self_hosted_multi_tenant_requires_flag_and_capability() {
		let with_cap = payload(&["multi_tenant"], "active", None);
		assert!(check_multi_tenant_enabled(&with_cap, false, true).is_ok());
		assert!(check_multi_tenant_enabled(&with_cap, false, false).is_err());

		let without_cap = payload(&[], "active", None);
		assert!(check_multi_tenant_enabled(&without_cap, false, true).is_err());
	}

	#[test]
	fn hosted_multi_tenant_only_checks_subscription() {
		let p = payload(&[], "active", None);
		assert!(check_multi_tenant_enabled(&p, true, false).is_ok());
	}
}
