//! # Order engine public API
//!
//! The API is split by concern, so that clients can use only the parts they need:
//!
//! * [`order_flow_api`] drives orders and card payments: order creation, payment intents, confirmation, webhook
//!   settlement, refunds and background reconciliation.
//! * [`accounts_api`] is read-only access to orders, transaction history and revenue figures.
//! * [`loyalty_api`] manages loyalty points and audits the loyalty ledger.
//!
//! Every API is created from a backend that implements the traits it needs, e.g.
//!
//! ```rust,ignore
//! let db = SqliteDatabase::new_with_url("sqlite://data/comanda.db", 10).await?;
//! let api = AccountApi::new(db);
//! let orders = api.orders_for_user(42).await?;
//! ```
pub mod accounts_api;
pub mod errors;
pub mod loyalty_api;
pub mod order_flow_api;
pub mod payment_objects;
