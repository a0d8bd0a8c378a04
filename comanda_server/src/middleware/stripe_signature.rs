//! Stripe webhook signature middleware.
//!
//! Stripe signs each webhook delivery with the endpoint's signing secret and sends the signature in the
//! `Stripe-Signature` header. The check needs the exact bytes that were signed, so the body is read here, verified,
//! and then put back for the handler.
//!
//! Requests with a missing or invalid signature are rejected with 400 and never reach the order engine.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use chrono::Utc;
use comanda_common::Secret;
use futures::future::LocalBoxFuture;
use log::*;
use stripe_tools::{verify_signature, SIGNATURE_HEADER};

pub struct StripeSignatureMiddlewareFactory {
    secret: Secret<String>,
    /// Maximum signature age, in seconds
    tolerance: i64,
}

impl StripeSignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, tolerance: i64) -> Self {
        StripeSignatureMiddlewareFactory { secret, tolerance }
    }
}

impl<S, B> Transform<S, ServiceRequest> for StripeSignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = StripeSignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(StripeSignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance: self.tolerance,
            service: Rc::new(service),
        }))
    }
}

pub struct StripeSignatureMiddlewareService<S> {
    secret: Secret<String>,
    tolerance: i64,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for StripeSignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let tolerance = self.tolerance;
        Box::pin(async move {
            trace!("🔐️ Checking Stripe signature for request");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔐️ No Stripe signature found in request. Denying access.");
                    ErrorBadRequest("No Stripe signature found.")
                })?
                .to_string();
            match verify_signature(data.as_ref(), &header, &secret, tolerance, Utc::now().timestamp()) {
                Ok(()) => {
                    trace!("🔐️ Stripe signature check for request ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Invalid Stripe signature. Denying access. {e}");
                    Err(ErrorBadRequest("Invalid Stripe signature."))
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
