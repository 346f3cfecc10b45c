use actix_web::http::header::HeaderMap;
use actix_web::{HttpMessage, HttpRequest};
use jsonwebtoken::decode_header;
use std::sync::Arc;
use std::time::Duration;

use super::failure::AuthFailure;
use super::jwks::JwksClient;
use super::revocation::RevocationStore;
use super::token::{extract_token, verify, Claims};
use crate::config::Config;

/// Runs the bearer-token pipeline for inbound requests.
///
/// Unauthenticated → header present → not revoked → key resolvable →
/// signature and claims valid → authenticated. The first failing step ends
/// the request.
pub struct Authenticator {
    jwks: JwksClient,
    audience: String,
    issuer: String,
    revocations: Arc<dyn RevocationStore>,
}

impl Authenticator {
    pub fn new(
        jwks: JwksClient,
        audience: impl Into<String>,
        issuer: impl Into<String>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            jwks,
            audience: audience.into(),
            issuer: issuer.into(),
            revocations,
        }
    }

    /// Fails only if the HTTP client for key retrieval cannot be built.
    pub fn from_config(
        config: &Config,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.jwks_timeout_secs);
        let jwks = match &config.jwks_url {
            Some(url) => JwksClient::with_url(url.clone(), timeout)?,
            None => JwksClient::for_domain(&config.auth0_domain, timeout)?,
        }
        .with_cache_ttl(Duration::from_secs(config.jwks_cache_ttl_secs));

        Ok(Self::new(jwks, config.api_audience.clone(), config.issuer(), revocations))
    }

    pub fn jwks_url(&self) -> &str {
        self.jwks.url()
    }

    /// Authenticates a request from its headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthFailure> {
        let token = extract_token(headers)?;
        self.authenticate_token(token).await
    }

    /// Authenticates a raw bearer token. Revocation is checked before any key
    /// is fetched or any signature trusted.
    pub async fn authenticate_token(&self, token: &str) -> Result<Claims, AuthFailure> {
        if self.is_revoked(token) {
            log::debug!("Rejected revoked token");
            return Err(AuthFailure::Revoked);
        }

        let kid = decode_header(token)
            .map_err(|_| AuthFailure::UnparsableToken)?
            .kid;
        let key_set = self.jwks.key_set_for(kid.as_deref()).await?;

        verify(token, &key_set, &self.audience, &self.issuer).map_err(|failure| {
            log::debug!("Token verification failed: {}", failure.code());
            failure
        })
    }

    /// Subject of the caller. Claims already established for this request are
    /// reused; otherwise the full pipeline runs and its claims are cached on
    /// the request.
    pub async fn current_subject(&self, req: &HttpRequest) -> Result<String, AuthFailure> {
        self.current_claims(req).await.map(|claims| claims.sub)
    }

    pub async fn current_claims(&self, req: &HttpRequest) -> Result<Claims, AuthFailure> {
        if let Some(claims) = req.extensions().get::<Claims>().cloned() {
            return Ok(claims);
        }

        let claims = self.authenticate(req.headers()).await?;
        req.extensions_mut().insert(claims.clone());
        Ok(claims)
    }

    /// Revokes `token` until its `exp` (seconds since the epoch).
    pub fn revoke(&self, token: &str, expires_at: u64) {
        self.revocations.revoke(token, expires_at);
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.revocations.is_revoked(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::InMemoryRevocationStore;
    use crate::auth::token::test_support::*;
    use actix_web::http::header::AUTHORIZATION;
    use actix_web::test::TestRequest;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn jwks_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS_JSON))
            .mount(&server)
            .await;
        server
    }

    fn authenticator_for(server: &MockServer) -> Authenticator {
        let jwks = JwksClient::with_url(
            format!("{}/.well-known/jwks.json", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        Authenticator::new(
            jwks,
            AUDIENCE,
            ISSUER,
            Arc::new(InMemoryRevocationStore::new()),
        )
    }

    fn bearer(token: &str) -> HeaderMap {
        TestRequest::default()
            .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
            .to_http_request()
            .headers()
            .clone()
    }

    #[actix_rt::test]
    async fn test_authenticate_valid_token() {
        let server = jwks_server().await;
        let authenticator = authenticator_for(&server);
        let token = sign(&claims("auth0|alice"));

        let claims = authenticator.authenticate(&bearer(&token)).await.unwrap();
        assert_eq!(claims.sub, "auth0|alice");
    }

    #[actix_rt::test]
    async fn test_authenticate_surfaces_header_failures() {
        let server = jwks_server().await;
        let authenticator = authenticator_for(&server);

        let result = authenticator.authenticate(&HeaderMap::new()).await;
        assert_eq!(result, Err(AuthFailure::MissingHeader));

        let headers = TestRequest::default()
            .insert_header((AUTHORIZATION, "Token abc"))
            .to_http_request()
            .headers()
            .clone();
        let result = authenticator.authenticate(&headers).await;
        assert_eq!(result, Err(AuthFailure::MalformedHeader));
    }

    #[actix_rt::test]
    async fn test_authenticate_unknown_kid() {
        let server = jwks_server().await;
        let authenticator = authenticator_for(&server);
        let token = sign_with(SIGNING_PEM, Some("unknown"), &claims("auth0|alice"));

        let result = authenticator.authenticate_token(&token).await;
        assert_eq!(result, Err(AuthFailure::KeyNotFound));
    }

    #[actix_rt::test]
    async fn test_revoked_token_is_rejected() {
        let server = jwks_server().await;
        let authenticator = authenticator_for(&server);
        let token = sign(&claims("auth0|alice"));

        assert!(authenticator.authenticate_token(&token).await.is_ok());

        authenticator.revoke(&token, (now() + 3600) as u64);

        assert!(authenticator.is_revoked(&token));
        let result = authenticator.authenticate_token(&token).await;
        assert_eq!(result, Err(AuthFailure::Revoked));
        // The signature itself is still good.
        assert!(verify(&token, &key_set(), AUDIENCE, ISSUER).is_ok());
    }

    #[actix_rt::test]
    async fn test_revocation_checked_before_key_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS_JSON))
            .expect(0)
            .mount(&server)
            .await;
        let authenticator = authenticator_for(&server);
        let token = sign(&claims("auth0|alice"));
        authenticator.revoke(&token, (now() + 3600) as u64);

        let result = authenticator.authenticate_token(&token).await;
        assert_eq!(result, Err(AuthFailure::Revoked));
    }

    #[actix_rt::test]
    async fn test_unreachable_issuer_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let authenticator = authenticator_for(&server);
        let token = sign(&claims("auth0|alice"));

        let result = authenticator.authenticate_token(&token).await;
        assert!(matches!(result, Err(AuthFailure::NetworkFailure(_))));
    }

    #[actix_rt::test]
    async fn test_current_subject_runs_pipeline_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS_JSON))
            .expect(1)
            .mount(&server)
            .await;
        let authenticator = authenticator_for(&server);
        let token = sign(&claims("auth0|carol"));
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
            .to_http_request();

        assert_eq!(authenticator.current_subject(&req).await.unwrap(), "auth0|carol");
        // Second lookup is served from the request extensions.
        assert_eq!(authenticator.current_subject(&req).await.unwrap(), "auth0|carol");
    }

    #[actix_rt::test]
    async fn test_current_subject_prefers_established_claims() {
        let server = MockServer::start().await;
        let authenticator = authenticator_for(&server);
        let req = TestRequest::default().to_http_request();
        let established: Claims = serde_json::from_value(json!({ "sub": "auth0|dave" })).unwrap();
        req.extensions_mut().insert(established);

        assert_eq!(authenticator.current_subject(&req).await.unwrap(), "auth0|dave");
    }

    #[actix_rt::test]
    async fn test_current_subject_without_header() {
        let server = MockServer::start().await;
        let authenticator = authenticator_for(&server);
        let req = TestRequest::default().to_http_request();

        assert_eq!(
            authenticator.current_subject(&req).await,
            Err(AuthFailure::MissingHeader)
        );
    }

    #[test]
    fn test_from_config_uses_issuer_domain() {
        let vars = std::collections::HashMap::from([
            ("DATABASE_URL".to_string(), "postgres://test".to_string()),
            ("AUTH0_DOMAIN".to_string(), "tenant.auth.test".to_string()),
            ("API_AUDIENCE".to_string(), AUDIENCE.to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();
        let authenticator =
            Authenticator::from_config(&config, Arc::new(InMemoryRevocationStore::new())).unwrap();

        assert_eq!(authenticator.issuer, ISSUER);
        assert_eq!(authenticator.audience, AUDIENCE);
        assert_eq!(
            authenticator.jwks.url(),
            "https://tenant.auth.test/.well-known/jwks.json"
        );
    }
}
