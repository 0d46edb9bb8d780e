use crate::config::AuthMode;
use crate::error::CoreError;
use crate::principal::Principal;

use super::extract::ExtractedPrincipal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
	Allowed,
}

/// C3 Auth Check: decides whether a request passes authentication, given the
/// configured [`AuthMode`] and what [`super::extract`] found on the request.
///
/// This never inspects the raw request again - it only reasons about the
/// already-extracted principal, keeping the fail-closed rules of spec.md
/// §4.3 in one place and unit-testable without constructing HTTP requests.
pub fn check_auth(mode: Option<&AuthMode>, extracted: &ExtractedPrincipal) -> Result<AuthDecision, CoreError> {
	let Some(mode) = mode else {
		// A nil config is fail-closed: 503, not "allow by default".
		return Err(CoreError::AuthUnavailable);
	};

	match mode {
		AuthMode::Open => Ok(AuthDecision::Allowed),
		AuthMode::Basic => {
			if extracted.principal.is_authenticated() {
				Ok(AuthDecision::Allowed)
			} else {
				Err(CoreError::Unauthenticated {
					challenge: "Basic realm=\"pulse\"",
				})
			}
		},
		AuthMode::ApiOnly => match &extracted.principal {
			Principal::ApiToken(_) => Ok(AuthDecision::Allowed),
			_ => Err(CoreError::Unauthenticated {
				challenge: "Bearer",
			}),
		},
		AuthMode::Oidc { .. } => match &extracted.principal {
			Principal::Oidc { .. } | Principal::User(_) => Ok(AuthDecision::Allowed),
			_ => Err(CoreError::Unauthenticated {
				challenge: "Bearer",
			}),
		},
		AuthMode::Proxy { .. } => match &extracted.principal {
			Principal::Proxy { .. } => Ok(AuthDecision::Allowed),
			_ => Err(CoreError::Unauthenticated {
				challenge: "Bearer",
			}),
		},
	}
}
