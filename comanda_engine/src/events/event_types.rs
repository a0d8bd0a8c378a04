use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Transaction};

/// A card payment settled and its order is now being prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub transaction: Transaction,
}

impl OrderPaidEvent {
    pub fn new(order: Order, transaction: Transaction) -> Self {
        Self { order, transaction }
    }
}

/// An order was cancelled because its payment was refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// A payment was declined or canceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub transaction: Transaction,
}

impl PaymentFailedEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }
}
