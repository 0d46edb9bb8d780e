//! C1 Principal Extractor + C3 Auth Check.
//!
//! Extraction only records what was presented on the request; it never
//! decides whether auth is *required* for the route. That decision belongs
//! to [`check`], which consults [`crate::config::AuthMode`].

pub mod check;
pub mod extract;
pub mod oidc;

pub use check::{AuthDecision, check_auth};
pub use extract::{ExtractedPrincipal, PrincipalSources, extract_principal};
pub use oidc::{JwksValidator, OidcClaims, OidcError};
