//! C7 Entitlement Evaluator + C8 Feature Gate.

pub mod evaluate;
pub mod gate;

pub use evaluate::{EntitlementPayload, LimitState, evaluate};
pub use gate::{GateOutcome, check_capability, check_hosted_subscription, check_multi_tenant_enabled, require_capability};
