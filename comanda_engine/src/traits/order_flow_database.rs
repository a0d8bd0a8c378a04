use chrono::{DateTime, Utc};

use crate::{
    api::errors::OrderFlowError,
    config::OrderFlowConfig,
    db_types::{NewOrderItem, NewTransaction, Order, OrderDetails, OrderStatusType, Transaction},
    traits::{DeletedOrder, SettlementOutcome, SettlementUpdate},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertTransactionResult {
    Inserted(Transaction),
    AlreadyExists(Transaction),
}

impl InsertTransactionResult {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Inserted(tx) | Self::AlreadyExists(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            Self::Inserted(tx) | Self::AlreadyExists(tx) => tx,
        }
    }
}

/// This trait defines the highest level of behaviour for storage backends supporting the order engine.
///
/// Every method runs as a single atomic unit of work. If any step fails, nothing is written.
/// Methods that read and then modify a payment transaction must lock its row before reading it, so that concurrent
/// settlements of the same payment intent are serialized.
#[allow(async_fn_in_trait)]
pub trait OrderFlowDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Prices and stores a new cash order for the user against the current catalog.
    ///
    /// * Every product must exist and be available.
    /// * Line items are stored with their unit price frozen at the current catalog price.
    /// * The order is stored as `pendiente`, with `floor(total / reward_rate)` points awarded.
    /// * The user's balance is incremented and a matching accrual entry is appended to the loyalty ledger.
    async fn create_order(
        &self,
        user_id: i64,
        items: &[NewOrderItem],
        config: &OrderFlowConfig,
    ) -> Result<OrderDetails, OrderFlowError>;

    /// Stores a `pending` transaction for a freshly opened payment intent. The insert is keyed on the external id, so
    /// repeating it returns the existing record.
    ///
    /// If an order is attached, it must exist, belong to the same user, still be `pendiente`, and its total must
    /// match the amount within the configured tolerance.
    async fn insert_pending_transaction(
        &self,
        transaction: NewTransaction,
        config: &OrderFlowConfig,
    ) -> Result<InsertTransactionResult, OrderFlowError>;

    /// The settlement applier. Locks the transaction row, then moves it to the reported state if that is a valid
    /// transition. On success, the attached order is moved into preparation, or a new order is created from the
    /// supplied items and linked. A refund cancels the attached order.
    ///
    /// Repeating a settlement that has already been applied changes nothing, and the outcome reports the current
    /// state.
    async fn apply_settlement(
        &self,
        update: SettlementUpdate,
        config: &OrderFlowConfig,
    ) -> Result<SettlementOutcome, OrderFlowError>;

    /// Claims a succeeded payment for a refund, before the gateway is asked to issue it. Only one refund of a payment
    /// can hold the claim. A claim made at or before `stale_before` is considered abandoned and can be taken over.
    ///
    /// Fails with [`OrderFlowError::AlreadyRefunded`] if the payment is refunded or another refund holds the claim,
    /// and with [`OrderFlowError::InvalidState`] for any other state.
    async fn claim_refund(
        &self,
        external_id: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<Transaction, OrderFlowError>;

    /// Drops a refund claim that did not lead to a refund.
    async fn release_refund(&self, external_id: &str) -> Result<(), OrderFlowError>;

    /// A staff-driven status change. See [`OrderStatusType::can_transition_to`].
    async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderFlowError>;

    /// Administrative cascade delete. Removes the order's line items, loyalty entries and payment transactions, and
    /// then the order itself. The owner's balance is reduced by the points those entries carried, so the ledger
    /// invariant still holds. If that would take a balance below zero, nothing is deleted and the call fails with
    /// [`OrderFlowError::InsufficientPoints`].
    async fn delete_order_cascade(&self, order_id: i64) -> Result<DeletedOrder, OrderFlowError>;

    async fn fetch_transaction(&self, external_id: &str) -> Result<Option<Transaction>, OrderFlowError>;

    async fn fetch_transaction_by_charge_id(&self, charge_id: &str) -> Result<Option<Transaction>, OrderFlowError>;

    /// Transactions still in `pending` or `requires_action` that were created before `created_before`.
    async fn fetch_stale_transactions(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, OrderFlowError>;
}
