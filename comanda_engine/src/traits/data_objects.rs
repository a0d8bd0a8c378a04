use serde::{Deserialize, Serialize};

use crate::{
    db_types::{LoyaltyLogEntry, Money, NewOrderItem, OrderDetails, Transaction, TransactionState},
    traits::ChargeDetails,
};

/// A gateway-reported payment state, on its way to the settlement applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementUpdate {
    /// The gateway payment intent id
    pub external_id: String,
    pub state: TransactionState,
    pub charge: Option<ChargeDetails>,
    pub error_message: Option<String>,
    /// For refunds: the amount the gateway refunded. Defaults to the full transaction amount.
    pub refunded_amount: Option<Money>,
    /// Order that the payment is for, if it was named by the client at confirmation
    pub order_id: Option<i64>,
    /// Line items for a payment-first order that should be created when the payment succeeds
    pub items: Vec<NewOrderItem>,
}

impl SettlementUpdate {
    pub fn new<S: Into<String>>(external_id: S, state: TransactionState) -> Self {
        Self {
            external_id: external_id.into(),
            state,
            charge: None,
            error_message: None,
            refunded_amount: None,
            order_id: None,
            items: Vec::new(),
        }
    }

    pub fn with_charge(mut self, charge: Option<ChargeDetails>) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_error_message(mut self, message: Option<String>) -> Self {
        self.error_message = message;
        self
    }

    pub fn with_refunded_amount(mut self, amount: Money) -> Self {
        self.refunded_amount = Some(amount);
        self
    }

    pub fn with_order_id(mut self, order_id: Option<i64>) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn with_items(mut self, items: Vec<NewOrderItem>) -> Self {
        self.items = items;
        self
    }
}

/// What the settlement applier did with the reported state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChange {
    /// The transaction moved to the reported state
    Applied,
    /// The transaction was already in the reported state
    AlreadyApplied,
    /// The reported state is stale, or not reachable from the current state, and was not applied
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// The transaction as it stands after the settlement
    pub transaction: Transaction,
    pub change: StateChange,
    /// The order linked to the transaction after the settlement, if any
    pub order: Option<OrderDetails>,
    /// A new order was created from the supplied items
    pub order_created: bool,
    /// An existing order was moved into preparation
    pub order_advanced: bool,
    /// The linked order was cancelled because of a refund
    pub order_cancelled: bool,
}

impl SettlementOutcome {
    /// True if this settlement is the one that paid for an order
    pub fn order_paid(&self) -> bool {
        self.order_created || self.order_advanced
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedOrder {
    pub order_id: i64,
    pub user_id: i64,
    pub items_removed: u64,
    pub transactions_removed: u64,
    pub ledger_entries_removed: u64,
    /// Net points removed from the owner's balance together with the ledger entries
    pub points_reversed: i64,
}

/// A loyalty ledger entry together with the user's balance after it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsMovement {
    pub entry: LoyaltyLogEntry,
    pub balance: i64,
}
