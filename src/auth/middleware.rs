use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use super::authenticator::Authenticator;
use crate::error::AppError;

/// Rejects requests without a valid bearer token before they reach a handler.
///
/// On success the verified `Claims` are stored in the request extensions, where
/// `AuthenticatedUser` and `Authenticator::current_subject` pick them up.
/// Failures are answered directly with the `AppError` JSON body.
/// Requires a `web::Data<Authenticator>` registered on the app.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let Some(authenticator) = req.app_data::<web::Data<Authenticator>>().cloned() else {
                log::error!("AuthMiddleware used without a registered Authenticator");
                let error = AppError::InternalServerError("Authentication is not configured".into());
                return Ok(req.into_response(error.error_response()).map_into_right_body());
            };

            let outcome = authenticator.authenticate(req.headers()).await;
            match outcome {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(failure) => {
                    log::debug!(
                        "Rejected {} {}: {}",
                        req.method(),
                        req.path(),
                        failure.code()
                    );
                    let response = AppError::from(failure).error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
