use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{LoyaltyLogEntry, Money, OrderDetails, Transaction, TransactionState},
    traits::StateChange,
};

/// Everything the client needs to complete a card payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentCreated {
    pub client_secret: Option<String>,
    pub transaction_id: i64,
    pub payment_intent_id: String,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPaymentResult {
    /// The local transaction state after the confirmation
    pub status: TransactionState,
    /// The status reported by the gateway
    pub gateway_status: String,
    pub change: StateChange,
    pub transaction: Transaction,
    pub order: Option<OrderDetails>,
    /// Only present when the customer still has to complete an authentication step
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub amount: Money,
    pub refund_status: String,
    pub transaction: Transaction,
    pub order: Option<OrderDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusReport {
    pub payment_intent_id: String,
    pub user_id: i64,
    /// The gateway's status for the intent
    pub status: String,
    /// The local transaction state
    pub db_status: TransactionState,
    pub amount: Money,
    pub currency: String,
    pub created: DateTime<Utc>,
    pub error: Option<String>,
}

/// The result of one pass of the stale payment reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltySummary {
    pub user_id: i64,
    pub balance: i64,
    pub history: Vec<LoyaltyLogEntry>,
}
