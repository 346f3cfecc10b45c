use std::fmt;

/// Why a request could not be authenticated.
///
/// Every variant is terminal for the request that produced it; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header, or an empty one.
    MissingHeader,
    /// The header is not of the form `Bearer <token>`.
    MalformedHeader,
    /// The token names a key ID the issuer does not publish (or names none).
    KeyNotFound,
    /// The token's `exp` is in the past.
    ExpiredSignature,
    /// Audience or issuer differ from the configured values, or a required claim is absent.
    ClaimMismatch,
    /// Any other decoding or signature failure.
    UnparsableToken,
    /// The token was revoked by a logout.
    Revoked,
    /// The issuer's key set could not be fetched.
    NetworkFailure(String),
}

impl AuthFailure {
    /// Short machine-readable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::MissingHeader => "missing_header",
            AuthFailure::MalformedHeader => "malformed_header",
            AuthFailure::KeyNotFound => "key_not_found",
            AuthFailure::ExpiredSignature => "expired_signature",
            AuthFailure::ClaimMismatch => "claim_mismatch",
            AuthFailure::UnparsableToken => "unparsable_token",
            AuthFailure::Revoked => "revoked",
            AuthFailure::NetworkFailure(_) => "network_failure",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthFailure::MissingHeader => write!(f, "Authorization header is missing"),
            AuthFailure::MalformedHeader => {
                write!(f, "Authorization header must be Bearer token")
            }
            AuthFailure::KeyNotFound => write!(f, "Unable to find appropriate key."),
            AuthFailure::ExpiredSignature => write!(f, "Token expired."),
            AuthFailure::ClaimMismatch => write!(
                f,
                "Incorrect claims. Please, check the audience and issuer."
            ),
            AuthFailure::UnparsableToken => write!(f, "Unable to parse authentication token."),
            AuthFailure::Revoked => write!(f, "Token has been revoked."),
            AuthFailure::NetworkFailure(msg) => {
                write!(f, "Unable to fetch signing keys: {}", msg)
            }
        }
    }
}

impl std::error::Error for AuthFailure {}
