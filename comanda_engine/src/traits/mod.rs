//! # Backend and gateway contracts
//!
//! This module defines the interface contracts that the order engine relies on. The engine itself is storage- and
//! provider-agnostic: the public APIs are generic over these traits.
//!
//! ## Traits
//! * [`OrderFlowDatabase`] is the highest level of behaviour for storage backends. Every method is one atomic unit of
//!   work: order creation, storing a pending payment, applying a settlement, staff status changes and the
//!   administrative cascade delete. These are the only writers of order status and transaction state.
//! * [`LoyaltyManagement`] covers point adjustments, redemptions, ledger history and the ledger audit. These are the
//!   only writers of a user's points balance, apart from accruals made during order creation.
//! * [`AccountManagement`] provides read-only queries over users, orders, transactions and revenue.
//! * [`PaymentGateway`] wraps the external card payment provider. Implementations must bound every call with a
//!   timeout. The provider is treated as unreliable, and its notifications are treated as at-least-once and unordered.
mod account_management;
mod data_objects;
mod loyalty_management;
mod order_flow_database;
mod payment_gateway;

pub use account_management::{AccountApiError, AccountManagement};
pub use data_objects::{DeletedOrder, PointsMovement, SettlementOutcome, SettlementUpdate, StateChange};
pub use loyalty_management::LoyaltyManagement;
pub use order_flow_database::{InsertTransactionResult, OrderFlowDatabase};
pub use payment_gateway::{
    ChargeDetails,
    GatewayError,
    GatewayEvent,
    GatewayEventKind,
    GatewayIntent,
    GatewayIntentStatus,
    GatewayRefund,
    NewPaymentIntent,
    PaymentGateway,
    RefundRequest,
    RefundedCharge,
};
