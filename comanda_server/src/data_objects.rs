use std::fmt::Display;

use chrono::NaiveDate;
use comanda_engine::db_types::{Money, NewOrderItem, OrderQueryFilter, OrderStatusType, Pagination};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
}

/// Opens a card payment. `amount` is in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub amount: Money,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
    #[serde(default)]
    pub order_id: Option<i64>,
    /// The items of a payment-first order, created once the payment succeeds
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPaymentRequest {
    pub payment_intent_id: String,
    /// Partial refund amount in minor units. Omit for a full refund.
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Pagination::new(params.limit, params.offset)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub points: i64,
    #[serde(default)]
    pub order_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustPointsRequest {
    pub user_id: i64,
    pub delta: i64,
}

/// Query string for the staff order list, e.g. `?status=pendiente&user_id=4`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListQuery {
    pub user_id: Option<i64>,
    pub status: Option<OrderStatusType>,
}

impl From<OrderListQuery> for OrderQueryFilter {
    fn from(query: OrderListQuery) -> Self {
        let mut filter = OrderQueryFilter::default();
        if let Some(user_id) = query.user_id {
            filter = filter.with_user_id(user_id);
        }
        if let Some(status) = query.status {
            filter = filter.with_status(status);
        }
        filter
    }
}
