//! # Comanda server
//!
//! The HTTP front end for the order and payment reconciliation engine. It is responsible for:
//! * Identifying callers from their bearer token and enforcing per-route role requirements.
//! * Exposing order creation, the card payment flow, refunds, reporting and loyalty operations.
//! * Receiving signed Stripe webhook deliveries and handing them to the settlement applier.
//! * Periodically re-polling payments that have been stuck in a pending state.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Authenticated routes. See [routes](routes/index.html).
//! * `/webhooks/stripe`: Stripe webhook deliveries. These are authenticated by their signature.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod hooks;
pub mod integrations;
pub mod middleware;
pub mod reconcile_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
