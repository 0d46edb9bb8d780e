use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{unfold, Stream};
use pulse::entitlement::evaluate::{BillingState, TierCatalogEntry};
use pulse::entitlement::EntitlementPayload;
use pulse::error::CoreError;
use pulse::org::Organization;
use pulse::principal::Principal;
use pulse::session::hash_token;
use pulse::sse::SseChannel;
use secrecy::SecretString;

use crate::entitlement_store::{empty_usage, DiskBillingState};
use crate::state::AppState;

/// The default org's trial window (spec.md §8 scenario 2 expects
/// `trial_days_remaining` in `[13, 14]` immediately after starting).
const TRIAL_DURATION_DAYS: i64 = 14;

/// No upsell tiers are catalogued for this deployment; `upgrade_reasons` is
/// always empty until a real tier catalog is wired in.
const NEXT_TIER: [TierCatalogEntry; 0] = [];

/// The narrow HTTP surface this crate owns directly: session introspection,
/// logout, the SSE event stream, and the entitlement/billing endpoints that
/// are part of the request-serving core itself rather than a domain handler
/// (C1/C2/C7/C8/C10). Other domain handlers (alerts, backups, recovery
/// points, ...) are external collaborators per spec.md §1 and are not
/// implemented here.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/api/session", get(session_info))
		.route("/api/logout", post(logout))
		.route("/api/events", get(events))
		.route("/api/license/entitlements", get(entitlements))
		.route("/api/license/trial/start", post(start_trial))
		.route("/api/admin/orgs", get(list_orgs))
		.route("/api/admin/orgs/{id}/billing-state", get(billing_state).put(put_billing_state))
		.with_state(state)
}

async fn session_info(
	Extension(principal): Extension<Principal>,
	Extension(org): Extension<Organization>,
	Extension(entitlement): Extension<EntitlementPayload>,
) -> impl IntoResponse {
	Json(serde_json::json!({
		"auth_method": principal.auth_method(),
		"authenticated": principal.is_authenticated(),
		"org_id": org.id,
		"subscription_state": entitlement.subscription_state,
		"capabilities": entitlement.capabilities,
	}))
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<SecretString> {
	headers
		.get_all(axum::http::header::COOKIE)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.flat_map(|v| v.split(';'))
		.filter_map(|kv| kv.trim().split_once('='))
		.find(|(k, _)| *k == name)
		.map(|(_, v)| SecretString::new(v.to_string().into()))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
	if let Some(raw) = cookie(&headers, "pulse_session") {
		if let Err(err) = state.sessions.revoke(&raw).await {
			tracing::warn!(error = %err, hash = %hash_token(&raw), "session revoke failed");
		}
	}
	axum::http::StatusCode::NO_CONTENT
}

/// Registers the connection in the SSE client registry and streams events
/// until the client disconnects (spec.md §4.10). The `watch::Sender` lives
/// inside the `unfold` state so it drops - ending the heartbeat loop -
/// exactly when this stream is dropped.
async fn events(State(state): State<AppState>, ConnectInfo(addr): ConnectInfo<SocketAddr>) -> impl IntoResponse {
	let (channel, receiver) = SseChannel::new(32);
	state.sse_registry.register(addr.ip(), channel.clone()).await;

	let (finished_tx, finished_rx) = tokio::sync::watch::channel(false);
	channel.spawn_heartbeat(finished_rx);
	state.metrics.sse_streams_active.get_or_create(&pulse_core::telemetry::SseStreamLabel { kind: "events".to_string() }).inc();

	let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
		Box::pin(unfold((receiver, finished_tx), |(mut receiver, finished_tx)| async move {
			let event = receiver.recv().await?;
			Some((Ok::<Event, Infallible>(event.into_axum_event()), (receiver, finished_tx)))
		}));

	let mut response = Sse::new(stream).into_response();
	for (key, value) in pulse::sse::headers::stream_headers().iter() {
		response.headers_mut().insert(key.clone(), value.clone());
	}
	response
}

/// Public entitlement payload for the request's resolved org (spec.md §6,
/// §8 scenario 1). `plan_version` mirrors `subscription_state`: this
/// deployment has no separate plan-versioning concept, so the two collapse
/// (recorded in DESIGN.md).
async fn entitlements(
	State(state): State<AppState>,
	Extension(entitlement): Extension<EntitlementPayload>,
) -> impl IntoResponse {
	Json(serde_json::json!({
		"subscription_state": entitlement.subscription_state,
		"plan_version": entitlement.subscription_state,
		"capabilities": entitlement.capabilities,
		"limits": entitlement.limits,
		"trial_days_remaining": entitlement.trial_days_remaining,
		"trial_eligible": entitlement.trial_eligible,
		"trial_eligibility_reason": entitlement.trial_eligibility_reason,
		"upgrade_reasons": entitlement.upgrade_reasons,
		"hosted_mode": state.config.hosted_mode,
	}))
}

/// Begins a trial for the request's resolved org; refuses a second start
/// with 409 (spec.md §8 scenario 2).
async fn start_trial(State(state): State<AppState>, Extension(org): Extension<Organization>) -> Result<impl IntoResponse, CoreError> {
	let snapshot = state.entitlement_store.get(&org.id).await;
	let mut billing = snapshot.load().as_ref().clone();
	if billing.trial_started_at.is_some() {
		return Err(CoreError::TrialAlreadyUsed);
	}

	let now = state.clock.now();
	billing.trial_started_at = Some(now);
	billing.trial_ends_at = Some(now + chrono::Duration::days(TRIAL_DURATION_DAYS));
	if billing.subscription_state.is_none() {
		billing.subscription_state = Some("trial".to_string());
	}

	state.entitlement_store.write(&org.id, billing.clone()).await.map_err(|err| CoreError::SaveFailed(err.to_string()))?;

	let payload = pulse::entitlement::evaluate::evaluate(None, &billing, &empty_usage(), state.clock.as_ref(), &NEXT_TIER);
	tracing::info!(target = "audit", action = "trial.start", org_id = %org.id, "trial started");
	Ok(Json(serde_json::json!({
		"subscription_state": payload.subscription_state,
		"trial_started_at": billing.trial_started_at,
		"trial_ends_at": billing.trial_ends_at,
		"trial_days_remaining": payload.trial_days_remaining,
	})))
}

/// Hosted-mode-only listing of every known org (spec.md §6).
async fn list_orgs(State(state): State<AppState>) -> Result<impl IntoResponse, CoreError> {
	if !state.config.hosted_mode {
		return Err(CoreError::NotFound);
	}
	let orgs = state.org_directory.list_all().await.map_err(|err| CoreError::ListFailed(err.to_string()))?;
	Ok(Json(orgs))
}

/// Hosted-mode-only admin read of an org's billing state (spec.md §6).
async fn billing_state(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, CoreError> {
	if !state.config.hosted_mode {
		return Err(CoreError::NotFound);
	}
	let snapshot = state.entitlement_store.get(&id).await;
	let on_disk: DiskBillingState = snapshot.load().as_ref().into();
	Ok(Json(on_disk))
}

/// Hosted-mode-only admin write of an org's billing state; a subsequent
/// read returns exactly the object written (spec.md §8 scenario 4).
async fn put_billing_state(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(body): Json<DiskBillingState>,
) -> Result<impl IntoResponse, CoreError> {
	if !state.config.hosted_mode {
		return Err(CoreError::NotFound);
	}
	let billing: BillingState = body.into();
	state.entitlement_store.write(&id, billing).await.map_err(|err| CoreError::SaveFailed(err.to_string()))?;

	let snapshot = state.entitlement_store.get(&id).await;
	let on_disk: DiskBillingState = snapshot.load().as_ref().into();
	Ok((StatusCode::OK, Json(on_disk)))
}
