use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::failure::AuthFailure;
use super::jwks::KeySet;

/// `aud` may be a single string or a list, depending on how many APIs the token targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims carried by a verified access or ID token.
///
/// `sub`, `aud`, `iss` and `exp` are required by validation, so a decoded
/// `Claims` always carries a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity-provider subject, e.g. `auth0|64f1...`.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the identity provider has verified `email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Pulls the raw token out of an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively and the header must consist of
/// exactly two whitespace-separated parts.
pub fn extract_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingHeader)?
        .to_str()
        .map_err(|_| AuthFailure::MalformedHeader)?;

    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        [] => Err(AuthFailure::MissingHeader),
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Ok(*token),
        _ => Err(AuthFailure::MalformedHeader),
    }
}

/// Verifies an RS256 token against `key_set` and returns its claims.
///
/// The key is selected by exact `kid` match; a token whose `kid` is not
/// published fails with `KeyNotFound` before any signature check.
pub fn verify(
    token: &str,
    key_set: &KeySet,
    audience: &str,
    issuer: &str,
) -> Result<Claims, AuthFailure> {
    let header = decode_header(token).map_err(|_| AuthFailure::UnparsableToken)?;
    let kid = header.kid.ok_or(AuthFailure::KeyNotFound)?;
    let key = key_set.get(&kid).ok_or(AuthFailure::KeyNotFound)?;

    if !key.is_rsa() {
        log::warn!("Key {} has unsupported type {}", kid, key.kty);
        return Err(AuthFailure::UnparsableToken);
    }
    let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
        .map_err(|_| AuthFailure::UnparsableToken)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| classify(e.kind()))
}

fn classify(kind: &ErrorKind) -> AuthFailure {
    match kind {
        ErrorKind::ExpiredSignature => AuthFailure::ExpiredSignature,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthFailure::ClaimMismatch,
        _ => AuthFailure::UnparsableToken,
    }
}
