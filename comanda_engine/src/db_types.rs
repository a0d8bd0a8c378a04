//! Data types that are persisted by the order engine backends, and that flow through its public API.
//!
//! Enumerations carry the exact wire/storage values used by the rest of the ordering platform, so that rows written
//! by the CRUD side of the platform and by this engine are interchangeable.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
pub use comanda_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {kind} value: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------        Role        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    #[serde(rename = "cliente")]
    #[sqlx(rename = "cliente")]
    Customer,
    Staff,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "cliente"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cliente" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError::new("role", s)),
        }
    }
}

//--------------------------------------     UserAccount     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Denormalized running sum of the user's loyalty ledger
    pub points_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Product       ---------------------------------------------------------
/// A point-in-time view of a catalog entry, as read when pricing an order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub available: bool,
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
pub enum OrderStatusType {
    /// The order has been placed, but no payment has settled and staff have not started on it.
    #[serde(rename = "pendiente")]
    #[sqlx(rename = "pendiente")]
    Pending,
    /// Paid, or accepted by staff, and being prepared.
    #[serde(rename = "en_preparacion")]
    #[sqlx(rename = "en_preparacion")]
    InPreparation,
    /// Ready for pickup
    #[serde(rename = "listo")]
    #[sqlx(rename = "listo")]
    Ready,
    #[serde(rename = "entregado")]
    #[sqlx(rename = "entregado")]
    Delivered,
    /// Cancelled by staff, or annulled by a refund.
    #[serde(rename = "cancelado")]
    #[sqlx(rename = "cancelado")]
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Status changes that staff may make by hand. Payment settlement and refunds have their own guarded transitions.
    ///
    /// | From \ To      | pendiente | en_preparacion | listo | entregado | cancelado |
    /// |----------------|-----------|----------------|-------|-----------|-----------|
    /// | pendiente      |           | ✔              |       |           | ✔         |
    /// | en_preparacion |           |                | ✔     |           | ✔         |
    /// | listo          |           |                |       | ✔         | ✔         |
    /// | entregado      |           |                |       |           |           |
    /// | cancelado      |           |                |       |           |           |
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, InPreparation) |
                (Pending, Cancelled) |
                (InPreparation, Ready) |
                (InPreparation, Cancelled) |
                (Ready, Delivered) |
                (Ready, Cancelled)
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Pending => "pendiente",
            OrderStatusType::InPreparation => "en_preparacion",
            OrderStatusType::Ready => "listo",
            OrderStatusType::Delivered => "entregado",
            OrderStatusType::Cancelled => "cancelado",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(Self::Pending),
            "en_preparacion" => Ok(Self::InPreparation),
            "listo" => Ok(Self::Ready),
            "entregado" => Ok(Self::Delivered),
            "cancelado" => Ok(Self::Cancelled),
            s => Err(ConversionError::new("order status", s)),
        }
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
pub enum PaymentMethod {
    #[serde(rename = "efectivo")]
    #[sqlx(rename = "efectivo")]
    Cash,
    #[serde(rename = "tarjeta")]
    #[sqlx(rename = "tarjeta")]
    Card,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "efectivo"),
            PaymentMethod::Card => write!(f, "tarjeta"),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatusType,
    pub total_price: Money,
    pub points_awarded: i64,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item. The unit price is frozen at the catalog price when the order was created.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub notes: String,
}

impl OrderItem {
    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A requested order line, as supplied by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub notes: String,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity, notes: String::new() }
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = notes.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub user_id: Option<i64>,
    pub statuses: Vec<OrderStatusType>,
}

impl OrderQueryFilter {
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.statuses.is_empty()
    }
}

//--------------------------------------   TransactionState  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionState {
    Pending,
    Succeeded,
    Failed,
    Canceled,
    RequiresAction,
    Refunded,
}

impl TransactionState {
    /// `Failed`, `Canceled` and `Refunded` never change again. `Succeeded` can only move to `Refunded`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Canceled | Self::Refunded)
    }

    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        match self {
            Pending | RequiresAction => !matches!(next, Refunded) && *self != next,
            Succeeded => next == Refunded,
            Failed | Canceled | Refunded => false,
        }
    }
}

impl Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionState::Pending => "pending",
            TransactionState::Succeeded => "succeeded",
            TransactionState::Failed => "failed",
            TransactionState::Canceled => "canceled",
            TransactionState::RequiresAction => "requires_action",
            TransactionState::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for TransactionState {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            "requires_action" => Ok(Self::RequiresAction),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError::new("transaction state", s)),
        }
    }
}

//--------------------------------------     Transaction     ---------------------------------------------------------
/// The local record of one gateway payment intent.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    /// The gateway's payment intent id
    pub external_id: String,
    pub charge_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub state: TransactionState,
    pub payment_method_type: Option<String>,
    pub card_last4: Option<String>,
    pub description: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub external_id: String,
    pub amount: Money,
    pub currency: String,
    pub description: String,
}

//--------------------------------------     Loyalty Log     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LoyaltyLogKind {
    Accrual,
    Redemption,
    ManualAdjustment,
}

impl Display for LoyaltyLogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoyaltyLogKind::Accrual => write!(f, "accrual"),
            LoyaltyLogKind::Redemption => write!(f, "redemption"),
            LoyaltyLogKind::ManualAdjustment => write!(f, "manual_adjustment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LoyaltyLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    /// The admin that made a manual adjustment
    pub actor_id: Option<i64>,
    pub kind: LoyaltyLogKind,
    /// Signed point movement
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoyaltyLogEntry {
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub kind: LoyaltyLogKind,
    pub points: i64,
}

/// Result of comparing a user's denormalized balance with the sum of their ledger.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub user_id: i64,
    pub balance: i64,
    pub ledger_sum: i64,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.ledger_sum
    }

    pub fn discrepancy(&self) -> i64 {
        self.balance - self.ledger_sum
    }
}

//--------------------------------------      Reporting      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueStats {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub transaction_count: i64,
    pub total_revenue: Money,
    pub average_transaction: Money,
}

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: DEFAULT_PAGE_SIZE, offset: 0 }
    }
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
