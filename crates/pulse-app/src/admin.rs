use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus_client::registry::Registry;
use pulse_core::telemetry::encode_registry;
use tokio::sync::RwLock;

/// The admin surface (`/healthz`, `/metrics`): not gated by the tenant/auth
/// middleware stack, grounded on the teacher's `management/admin.rs`
/// liveness/config-dump pattern (SPEC_FULL.md §C.2).
#[derive(Clone)]
pub struct AdminState {
	pub registry: Arc<RwLock<Registry>>,
}

async fn healthz() -> impl IntoResponse {
	(StatusCode::OK, "ok")
}

async fn metrics(State(state): State<AdminState>) -> impl IntoResponse {
	let registry = state.registry.read().await;
	match encode_registry(&registry) {
		Ok(body) => (StatusCode::OK, body).into_response(),
		Err(err) => {
			tracing::error!(error = %err, "failed to encode metrics registry");
			(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
		},
	}
}

pub fn admin_router(state: AdminState) -> Router {
	Router::new().route("/healthz", get(healthz)).route("/metrics", get(metrics)).with_state(state)
}
