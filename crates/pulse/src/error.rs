use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulse_core::ErrorKind;
use serde::Serialize;

/// The structured JSON error body of spec.md §4.12/§7.
///
/// `error` is always present and is the stable snake_case code callers can
/// match on (`invalid_org`, `license_required`, ...). `message` is the
/// human-readable explanation. `code` duplicates `error` for callers that
/// distinguish "the error kind" from "a finer-grained code"; `details` is a
/// free-form payload (e.g. the `{feature, action_url}` pair on 402s).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
	pub error: &'static str,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<&'static str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

impl ErrorBody {
	pub fn new(error: &'static str, message: impl Into<String>) -> Self {
		Self {
			error,
			message: message.into(),
			code: None,
			details: None,
		}
	}

	pub fn with_details(mut self, details: serde_json::Value) -> Self {
		self.details = Some(details);
		self
	}
}

/// Every fallible operation in the core returns one of these. Middleware
/// converts it to an HTTP response via `IntoResponse`; it never leaks a
/// backend error verbatim (the `Internal` variant's detail is logged, not
/// serialized).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
	#[error("authentication subsystem unavailable")]
	AuthUnavailable,
	#[error("org store unavailable")]
	OrgsUnavailable,
	#[error("invalid org: {0}")]
	InvalidOrg(String),
	#[error("org suspended or pending deletion")]
	OrgSuspended,
	#[error("access denied: {0}")]
	AccessDenied(String),
	#[error("missing or invalid credential")]
	Unauthenticated { challenge: &'static str },
	#[error("license required: {feature}")]
	LicenseRequired {
		feature: String,
		action_url: Option<String>,
	},
	#[error("subscription required")]
	SubscriptionRequired,
	#[error("invalid subscription state: {0}")]
	InvalidSubscriptionState(String),
	#[error("tenant rate limit exceeded")]
	RateLimited {
		retry_after_secs: u64,
		limit: u64,
		org_id: String,
	},
	#[error("trial already started")]
	TrialAlreadyUsed,
	#[error("demo mode enabled")]
	DemoMode,
	#[error("not found")]
	NotFound,
	#[error("save failed: {0}")]
	SaveFailed(String),
	#[error("list failed: {0}")]
	ListFailed(String),
	#[error("internal error: {0}")]
	Internal(#[from] anyhow::Error),
}

impl CoreError {
	pub fn kind(&self) -> ErrorKind {
		use CoreError::*;
		match self {
			AuthUnavailable | OrgsUnavailable => ErrorKind::Unavailable,
			InvalidOrg(_) => ErrorKind::Invalid,
			OrgSuspended | AccessDenied(_) | DemoMode => ErrorKind::Forbidden,
			Unauthenticated { .. } => ErrorKind::Unauthenticated,
			LicenseRequired { .. } | SubscriptionRequired | InvalidSubscriptionState(_) => {
				ErrorKind::EntitlementRequired
			},
			RateLimited { .. } => ErrorKind::RateLimited,
			TrialAlreadyUsed => ErrorKind::Invalid,
			NotFound => ErrorKind::NotFound,
			SaveFailed(_) | ListFailed(_) | Internal(_) => ErrorKind::Internal,
		}
	}

	fn status(&self) -> StatusCode {
		use CoreError::*;
		match self {
			AuthUnavailable | OrgsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
			InvalidOrg(_) => StatusCode::BAD_REQUEST,
			OrgSuspended | AccessDenied(_) | DemoMode => StatusCode::FORBIDDEN,
			Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
			LicenseRequired { .. } | SubscriptionRequired | InvalidSubscriptionState(_) => {
				StatusCode::PAYMENT_REQUIRED
			},
			RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			TrialAlreadyUsed => StatusCode::CONFLICT,
			NotFound => StatusCode::NOT_FOUND,
			SaveFailed(_) | ListFailed(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn body(&self) -> ErrorBody {
		use CoreError::*;
		match self {
			AuthUnavailable => ErrorBody::new("orgs_unavailable", "Authentication unavailable"),
			OrgsUnavailable => ErrorBody::new("orgs_unavailable", "Organization store unavailable"),
			InvalidOrg(id) => ErrorBody::new("invalid_org", format!("org {id:?} does not exist")),
			OrgSuspended => ErrorBody::new("org_suspended", "Organization is suspended or pending deletion"),
			AccessDenied(reason) => ErrorBody::new("access_denied", reason.clone()),
			Unauthenticated { .. } => ErrorBody::new("access_denied", "Authentication required"),
			LicenseRequired {
				feature,
				action_url,
			} => ErrorBody::new("license_required", format!("{feature} requires a license upgrade"))
				.with_details(serde_json::json!({"feature": feature, "action_url": action_url})),
			SubscriptionRequired => ErrorBody::new("subscription_required", "An active subscription is required"),
			InvalidSubscriptionState(s) => {
				ErrorBody::new("invalid_subscription_state", format!("invalid subscription state {s:?}"))
			},
			RateLimited { .. } => ErrorBody::new("tenant_rate_limit_exceeded", "Too many requests for this organization"),
			TrialAlreadyUsed => ErrorBody::new("trial_already_used", "A trial has already been started for this organization"),
			DemoMode => ErrorBody::new("Demo mode enabled", "This action is disabled in demo mode"),
			NotFound => ErrorBody::new("not_found", "Not found"),
			SaveFailed(detail) => {
				tracing::error!(error = %detail, "save failed");
				ErrorBody::new("save_failed", "Failed to save")
			},
			ListFailed(detail) => {
				tracing::error!(error = %detail, "list failed");
				ErrorBody::new("list_failed", "Failed to list")
			},
			Internal(err) => {
				tracing::error!(error = %err, "internal error");
				ErrorBody::new("internal_error", "Internal server error")
			},
		}
	}
}

impl IntoResponse for CoreError {
	fn into_response(self) -> Response {
		let status = self.status();
		let mut resp = (status, Json(self.body())).into_response();
		if let CoreError::Unauthenticated { challenge } = &self {
			if let Ok(value) = axum::http::HeaderValue::from_str(challenge) {
				resp.headers_mut().insert(axum::http::header::WWW_AUTHENTICATE, value);
			}
		}
		if let CoreError::RateLimited {
			retry_after_secs,
			limit,
			org_id,
		} = &self
		{
			let headers = resp.headers_mut();
			if let Ok(v) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
				headers.insert("Retry-After", v);
			}
			if let Ok(v) = axum::http::HeaderValue::from_str(&limit.to_string()) {
				headers.insert("X-RateLimit-Limit", v);
			}
			headers.insert("X-RateLimit-Remaining", axum::http::HeaderValue::from_static("0"));
			if let Ok(v) = axum::http::HeaderValue::from_str(org_id) {
				headers.insert("X-Pulse-Org-ID", v);
			}
		}
		if matches!(self, CoreError::DemoMode) {
			resp
				.headers_mut()
				.insert("X-Demo-Mode", axum::http::HeaderValue::from_static("true"));
		}
		resp
	}
}
