use std::sync::Arc;

use pulse::config::SharedConfig;
use pulse::ratelimit::TenantRateLimiter;
use pulse::session::SessionStore;
use pulse::sse::SseRegistry;
use pulse::tenant::registry::TenantServiceRegistry;
use pulse_core::Clock;
use pulse_core::telemetry::Metrics;

use crate::entitlement_store::OrgEntitlementStore;
use crate::fs_org_directory::FsOrgDirectory;
use crate::sources::AppPrincipalSources;
use crate::tenant_factory::FsTenantServiceFactory;

/// Everything a request handler or middleware stage needs, assembled once in
/// `main` and handed to axum via the `State` extractor.
#[derive(Clone)]
pub struct AppState {
	pub config: SharedConfig,
	pub sessions: SessionStore,
	pub principal_sources: Arc<AppPrincipalSources>,
	pub org_directory: Arc<FsOrgDirectory>,
	pub tenant_registry: Arc<TenantServiceRegistry<FsTenantServiceFactory>>,
	pub rate_limiter: Arc<TenantRateLimiter>,
	pub sse_registry: Arc<SseRegistry>,
	pub entitlement_store: Arc<OrgEntitlementStore>,
	pub metrics: Arc<Metrics>,
	pub clock: Arc<dyn Clock>,
}
