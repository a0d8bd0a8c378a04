//! # Stripe tools
//!
//! A thin client for the parts of the Stripe REST API that the Comanda payment flow needs: payment intents and
//! refunds. It also verifies the `Stripe-Signature` header on webhook deliveries and parses the event envelope.
//!
//! The client knows nothing about orders or transactions. Mapping Stripe objects onto the order engine's gateway
//! types is done by the server.
mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;
pub mod webhook;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    CardDetails,
    Charge,
    ExpandableCharge,
    NewIntent,
    PaymentError,
    PaymentIntent,
    PaymentMethodDetails,
    Refund,
    WebhookEvent,
};
pub use error::StripeApiError;
pub use webhook::{construct_event, verify_signature, SIGNATURE_HEADER};
