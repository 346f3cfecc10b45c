use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use super::authenticator::Authenticator;
use super::token::Claims;
use crate::error::AppError;

/// The verified caller of a request.
///
/// Behind `AuthMiddleware` this reuses the claims the middleware stored in the
/// request extensions. On unguarded routes it runs the authenticator itself, so
/// a handler taking `AuthenticatedUser` is always protected.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn sub(&self) -> &str {
        &self.claims.sub
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let authenticator = req
                .app_data::<web::Data<Authenticator>>()
                .cloned()
                .ok_or_else(|| {
                    AppError::InternalServerError("Authentication is not configured".into())
                })?;

            let claims = authenticator
                .current_claims(&req)
                .await
                .map_err(AppError::from)?;
            Ok(AuthenticatedUser { claims })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwks::JwksClient;
    use crate::auth::revocation::InMemoryRevocationStore;
    use crate::auth::token::test_support::{AUDIENCE, ISSUER};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use actix_web::HttpMessage;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn authenticator() -> web::Data<Authenticator> {
        // Never contacted: the tests below fail or succeed before any key fetch.
        let jwks = JwksClient::with_url("http://127.0.0.1:9/jwks.json", Duration::from_millis(100))
            .unwrap();
        web::Data::new(Authenticator::new(
            jwks,
            AUDIENCE,
            ISSUER,
            Arc::new(InMemoryRevocationStore::new()),
        ))
    }

    #[actix_rt::test]
    async fn test_authenticated_user_from_extensions() {
        let req = test::TestRequest::default()
            .app_data(authenticator())
            .to_http_request();
        let claims: Claims = serde_json::from_value(json!({ "sub": "auth0|123" })).unwrap();
        req.extensions_mut().insert(claims);

        let mut payload = Payload::None;
        let user = AuthenticatedUser::from_request(&req, &mut payload)
            .await
            .unwrap();
        assert_eq!(user.sub(), "auth0|123");
    }

    #[actix_rt::test]
    async fn test_authenticated_user_missing_header() {
        let req = test::TestRequest::default()
            .app_data(authenticator())
            .to_http_request();

        let mut payload = Payload::None;
        let err = AuthenticatedUser::from_request(&req, &mut payload)
            .await
            .unwrap_err();
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_authenticated_user_without_authenticator() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let err = AuthenticatedUser::from_request(&req, &mut payload)
            .await
            .unwrap_err();
        assert_eq!(
            err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
