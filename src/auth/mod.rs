//! Bearer-token authentication against an external identity provider.
//!
//! Tokens are RS256 JWTs verified with the issuer's published JWKS. The
//! `Authenticator` ties together header extraction, key retrieval, claim
//! validation and the revocation store used by logout.

pub mod authenticator;
pub mod extractors;
pub mod failure;
pub mod jwks;
pub mod middleware;
pub mod password;
pub mod revocation;
pub mod token;

use lazy_static::lazy_static;
use serde::Deserialize;
use validator::Validate;

pub use authenticator::Authenticator;
pub use extractors::AuthenticatedUser;
pub use failure::AuthFailure;
pub use jwks::{fetch_key_set, jwks_url, Jwk, JwksClient, KeySet};
pub use middleware::AuthMiddleware;
pub use password::hash_password;
pub use revocation::{InMemoryRevocationStore, RevocationStore};
pub use token::{extract_token, verify, Audience, Claims};

lazy_static! {
    // Alphanumeric, underscores and hyphens.
    pub(crate) static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Payload for a local account registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Between 3 and 40 characters, alphanumeric plus underscores or hyphens.
    #[validate(
        length(min = 3, max = 40),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[validate(email, length(max = 254))]
    pub email: String,
    /// At least 6 characters; stored as a bcrypt hash.
    #[validate(length(min = 6, max = 72))]
    pub password: String,
}
