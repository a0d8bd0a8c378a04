//! Bearer token middleware.
//!
//! Validates the `Authorization: Bearer <token>` header and stores the [`JwtClaims`] in the request extensions, where
//! handlers pick them up as an extractor and [`super::AclMiddlewareFactory`] checks them against route roles.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::TokenValidator,
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    validator: TokenValidator,
}

impl JwtMiddlewareFactory {
    pub fn new(validator: TokenValidator) -> Self {
        JwtMiddlewareFactory { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { validator: self.validator.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    validator: TokenValidator,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(String::from);
        let claims = match header.as_deref().and_then(TokenValidator::extract_from_header) {
            Some(token) => self.validator.validate(token),
            None => Err(AuthError::MissingToken),
        };
        Box::pin(async move {
            match claims {
                Ok(claims) => {
                    trace!("🔐️ Request from user #{} ({})", claims.id, claims.rol);
                    req.extensions_mut().insert(claims);
                    service.call(req).await
                },
                Err(e) => {
                    debug!("🔐️ Rejecting request to {}. {e}", req.path());
                    Err(ServerError::AuthenticationError(e).into())
                },
            }
        })
    }
}
