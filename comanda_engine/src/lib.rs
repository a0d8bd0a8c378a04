//! Comanda order engine
//!
//! The order engine is the reconciliation core of the Comanda ordering platform. It creates orders at frozen catalog
//! prices, tracks card payments through their lifecycle, applies gateway notifications idempotently, processes
//! refunds and keeps the loyalty ledger consistent with each customer's points balance.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@db`]). SQLite is the supported backend. You should never need to access the database directly.
//!    Use the public API instead. The data types that are stored are defined in [`db_types`] and are public.
//! 2. The backend traits ([`traits`]). A storage backend implements these to support the APIs. The payment gateway is
//!    also abstracted behind a trait here, so the engine is provider-agnostic.
//! 3. The public API ([`mod@api`]): [`OrderFlowApi`], [`AccountApi`] and [`LoyaltyApi`].
//!
//! The engine emits [`events`] when payments settle, so that other components can react to them.
mod db;

pub mod api;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    accounts_api::AccountApi,
    errors::{ErrorCategory, OrderFlowError},
    loyalty_api::LoyaltyApi,
    order_flow_api::OrderFlowApi,
    payment_objects,
};
pub use config::OrderFlowConfig;
#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
