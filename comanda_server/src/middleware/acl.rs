//! Access control list middleware.
//!
//! Checks the role in the caller's token against the roles a route accepts. The caller must hold one of them. A
//! request without claims is rejected with 401, and a caller with the wrong role gets 403.
//!
//! This middleware relies on [`super::JwtMiddlewareFactory`] having run first.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use comanda_engine::db_types::Role;
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::JwtClaims,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) }))
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
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
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
                warn!("🔐️ No JWT claims found in request extensions for {}", req.path());
                ServerError::AuthenticationError(AuthError::MissingToken)
            })?;
            if claims.has_any_role(&allowed_roles) {
                service.call(req).await
            } else {
                debug!("🔐️ User #{} ({}) may not access {}", claims.id, claims.rol, req.path());
                let roles = allowed_roles.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ");
                Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(format!(
                    "This route requires one of these roles: {roles}"
                )))
                .into())
            }
        })
    }
}
