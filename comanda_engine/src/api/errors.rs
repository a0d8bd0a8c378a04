use thiserror::Error;

use crate::{
    db_types::{Money, OrderStatusType, TransactionState},
    traits::{AccountApiError, GatewayError},
};

/// The broad classes of failure that callers of the order flow need to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing input
    Validation,
    /// An unknown product, order, transaction or user
    NotFound,
    /// The request contradicts stored data, e.g. an amount mismatch or a double refund
    Conflict,
    /// The payment provider failed or timed out. Retryable.
    Gateway,
    /// The operation is not valid for the current state machine position
    State,
    Database,
}

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Invalid quantity {quantity} for product #{product_id}. Quantities must be at least 1")]
    InvalidQuantity { product_id: i64, quantity: i64 },
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("The amount {amount} is below the minimum charge of {minimum}")]
    BelowMinimumCharge { amount: Money, minimum: Money },
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("User #{user_id} has a balance of {balance} points, which cannot absorb a change of {delta} points")]
    InsufficientPoints { user_id: i64, balance: i64, delta: i64 },
    #[error("User #{0} is not an administrator")]
    ActorNotAdmin(i64),
    #[error("Product #{0} does not exist")]
    ProductNotFound(i64),
    #[error("Product #{0} ({1}) is not available")]
    ProductUnavailable(i64, String),
    #[error("User #{0} does not exist")]
    UserNotFound(i64),
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("There is no transaction for payment intent {0}")]
    TransactionNotFound(String),
    #[error("The paid amount of {paid} does not match the order total of {expected}")]
    AmountMismatch { expected: Money, paid: Money },
    #[error("{0}")]
    OrderMismatch(String),
    #[error("Payment {0} has already been refunded")]
    AlreadyRefunded(String),
    #[error("Cannot {action} payment {external_id} while it is '{state}'")]
    InvalidState { external_id: String, state: TransactionState, action: &'static str },
    #[error("Order #{order_id} cannot change from '{from}' to '{to}'")]
    InvalidStatusTransition { order_id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error("Database error. {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn category(&self) -> ErrorCategory {
        use OrderFlowError::*;
        match self {
            EmptyOrder |
            InvalidQuantity { .. } |
            InvalidAmount(_) |
            BelowMinimumCharge { .. } |
            ValidationError(_) |
            InsufficientPoints { .. } |
            ActorNotAdmin(_) |
            ProductUnavailable(..) => ErrorCategory::Validation,
            ProductNotFound(_) | UserNotFound(_) | OrderNotFound(_) | TransactionNotFound(_) => {
                ErrorCategory::NotFound
            },
            AmountMismatch { .. } | OrderMismatch(_) | AlreadyRefunded(_) => ErrorCategory::Conflict,
            InvalidState { .. } | InvalidStatusTransition { .. } => ErrorCategory::State,
            Gateway(_) => ErrorCategory::Gateway,
            DatabaseError(_) => ErrorCategory::Database,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<AccountApiError> for OrderFlowError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::DatabaseError(s) => Self::DatabaseError(s),
            AccountApiError::QueryError(s) => Self::ValidationError(s),
        }
    }
}
