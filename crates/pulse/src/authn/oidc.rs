use std::collections::HashMap;

use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};

/// Decoded, validated claims from an OIDC ID token. Only the fields Pulse
/// actually consumes are pulled out; the rest of the token is discarded
/// rather than carried around as an opaque map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcClaims {
	pub subject: String,
	pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
	#[error("token header is malformed: {0}")]
	InvalidHeader(jsonwebtoken::errors::Error),
	#[error("token header does not specify a key id")]
	MissingKeyId,
	#[error("token refers to an unknown signing key {0:?}")]
	UnknownKeyId(String),
	#[error("token failed validation: {0}")]
	Invalid(jsonwebtoken::errors::Error),
	#[error("jwks fetch failed: {0}")]
	JwksFetch(String),
	#[error("jwks key {key_id} uses an unsupported algorithm")]
	UnsupportedAlgorithm { key_id: String },
}

struct Jwk {
	decoding: DecodingKey,
	validation: Validation,
}

/// Verifies OIDC ID tokens against a fetched JWKS, keyed by `kid`
/// (grounded on the teacher's `http/jwt.rs` `Jwt`/`Jwk` pattern, narrowed to
/// the single issuer/audience Pulse's `AuthMode::Oidc` configures).
pub struct JwksValidator {
	keys: HashMap<String, Jwk>,
	issuer: String,
}

impl JwksValidator {
	/// Builds a validator from an already-fetched JWK set. Fetching itself
	/// (an HTTP GET to `jwks_uri`, cached with a TTL) is the app binary's
	/// responsibility, since it requires an HTTP client and a refresh
	/// policy that don't belong in this crate's pure auth logic.
	pub fn from_jwks(jwks: JwkSet, issuer: &str, client_id: &str) -> Result<Self, OidcError> {
		let mut keys = HashMap::new();
		for jwk in jwks.keys {
			let Some(kid) = jwk.common.key_id.clone() else {
				continue;
			};
			let decoding = match &jwk.algorithm {
				AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(OidcError::Invalid)?,
				AlgorithmParameters::EllipticCurve(ec) => {
					DecodingKey::from_ec_components(&ec.x, &ec.y).map_err(OidcError::Invalid)?
				},
				_ => return Err(OidcError::UnsupportedAlgorithm { key_id: kid }),
			};
			let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
			validation.set_audience(&[client_id]);
			validation.set_issuer(&[issuer]);
			keys.insert(kid, Jwk { decoding, validation });
		}
		Ok(Self {
			keys,
			issuer: issuer.to_string(),
		})
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	pub fn validate(&self, token: &str) -> Result<OidcClaims, OidcError> {
		let header = decode_header(token).map_err(OidcError::InvalidHeader)?;
		let kid = header.kid.ok_or(OidcError::MissingKeyId)?;
		let key = self.keys.get(&kid).ok_or_else(|| OidcError::UnknownKeyId(kid.clone()))?;

		let decoded = decode::<serde_json::Map<String, serde_json::Value>>(token, &key.decoding, &key.validation)
			.map_err(OidcError::Invalid)?;

		let subject = decoded
			.claims
			.get("sub")
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.ok_or_else(|| OidcError::Invalid(jsonwebtoken::errors::ErrorKind::InvalidSubject.into()))?;
		let email = decoded.claims.get("email").and_then(|v| v.as_str()).map(str::to_string);

		Ok(OidcClaims { subject, email })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_jwks_rejects_every_token_with_unknown_key() {
		let validator = JwksValidator::from_jwks(JwkSet { keys: vec![] }, "https://issuer.example", "client-1").unwrap();
		let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6ImsxIn0.eyJzdWIiOiJ1MSJ9.sig";
		let err = validator.validate(token).unwrap_err();
		assert!(matches!(err, OidcError::UnknownKeyId(_)));
	}
}
