use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pulse::authn::{check_auth, extract_principal};
use pulse::authz::check_org_access;
use pulse::demo::check_demo_mode;
use pulse::entitlement::evaluate as entitlement;
use pulse::error::CoreError;
use pulse::respond::{normalize_route, status_class};
use pulse::tenant::resolve_effective_org;

use crate::entitlement_store::empty_usage;
use crate::state::AppState;

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.flat_map(|v| v.split(';'))
		.filter_map(|kv| kv.trim().split_once('='))
		.find(|(k, _)| *k == name)
		.map(|(_, v)| v.to_string())
}

fn record_metrics(state: &AppState, method: &axum::http::Method, path: &str, start: Instant, status: axum::http::StatusCode) {
	let label = pulse_core::telemetry::RouteLabel {
		route: normalize_route(path),
		method: method.to_string(),
		status_class: status_class(status).to_string(),
	};
	state.metrics.requests_total.get_or_create(&label).inc();
	state.metrics.request_duration_seconds.get_or_create(&label).observe(start.elapsed().as_secs_f64());
}

fn finish_error(state: &AppState, method: &axum::http::Method, path: &str, start: Instant, err: CoreError) -> Response {
	if matches!(err, CoreError::RateLimited { .. }) {
		state.metrics.rate_limited_total.inc();
	}
	if matches!(err, CoreError::DemoMode) {
		state.metrics.demo_mode_rejections_total.inc();
	}
	let response = err.into_response();
	record_metrics(state, method, path, start, response.status());
	response
}

/// The fixed middleware pipeline of spec.md §5: Demo -> Principal ->
/// Auth -> Tenant -> Authorization -> Entitlement -> RateLimit -> handler.
/// Each stage can only shorten the chain by returning early with an error;
/// none of them may reorder around another.
pub async fn pipeline(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
	let method = req.method().clone();
	let path = req.uri().path().to_string();
	let headers = req.headers().clone();
	let start = Instant::now();

	if state.config.demo_mode {
		if let Err(err) = check_demo_mode(&method, &path, &headers) {
			return finish_error(&state, &method, &path, start, err);
		}
	}

	let extracted = extract_principal(&req, state.principal_sources.as_ref()).await;

	if let Err(err) = check_auth(Some(&state.config.auth), &extracted) {
		return finish_error(&state, &method, &path, start, err);
	}

	let cookie_org_id = cookie_value(&headers, "pulse_org_id");
	let org = match resolve_effective_org(&headers, cookie_org_id.as_deref(), &extracted.principal, state.org_directory.as_ref()).await {
		Ok(org) => org,
		Err(err) => return finish_error(&state, &method, &path, start, err),
	};

	let decision = check_org_access(
		&extracted.principal,
		&org,
		state.config.organization_loader_configured,
		state.config.default_org_strict_membership,
	);
	if !decision.allowed {
		return finish_error(&state, &method, &path, start, CoreError::AccessDenied(decision.reason));
	}

	let billing_snapshot = state.entitlement_store.get(&org.id).await;
	let payload = entitlement::evaluate(None, billing_snapshot.load().as_ref(), &empty_usage(), state.clock.as_ref(), &[]);

	if let Err(err) = state.rate_limiter.check(&org.id, chrono::Utc::now()).await {
		return finish_error(&state, &method, &path, start, err);
	}

	req.extensions_mut().insert(extracted.principal);
	req.extensions_mut().insert(org);
	req.extensions_mut().insert(payload);

	let response = next.run(req).await;
	record_metrics(&state, &method, &path, start, response.status());
	response
}

/// Security response headers applied to every response regardless of
/// outcome, grounded on the `adx-core` tenant-service
/// `security_headers_middleware` pattern (SPEC_FULL.md §C.3).
pub async fn security_headers(req: Request, next: Next) -> Response {
	let mut response = next.run(req).await;
	let headers = response.headers_mut();
	headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
	headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
	headers.insert("Referrer-Policy", HeaderValue::from_static("strict-origin-when-cross-origin"));
	response
}
