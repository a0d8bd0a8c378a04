use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Money, TransactionState};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("The payment gateway did not respond in time. {0}")]
    Timeout(String),
    #[error("Could not reach the payment gateway. {0}")]
    Network(String),
    #[error("The payment gateway rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment gateway sent a response that could not be understood. {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Timeouts, network failures and provider-side errors can be retried. Local state is never changed when a
    /// gateway call fails, so retrying is always safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// The gateway's view of a payment intent's status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(untagged)]
    Other(String),
}

impl GatewayIntentStatus {
    /// Maps the gateway status onto the local transaction state machine.
    ///
    /// An intent that still needs a payment method after the customer tried to pay was declined, so it maps to
    /// `failed`, as do statuses this engine doesn't know about.
    pub fn settlement_state(&self) -> TransactionState {
        match self {
            Self::Succeeded => TransactionState::Succeeded,
            Self::RequiresAction => TransactionState::RequiresAction,
            Self::Processing | Self::RequiresConfirmation | Self::RequiresCapture => TransactionState::Pending,
            Self::Canceled => TransactionState::Canceled,
            Self::RequiresPaymentMethod | Self::Other(_) => TransactionState::Failed,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Other(s) => s.as_str(),
        }
    }
}

/// Payment method details captured from the charge that settled an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeDetails {
    pub id: String,
    pub payment_method_type: Option<String>,
    pub last4: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: GatewayIntentStatus,
    pub charge: Option<ChargeDetails>,
    /// The decline message of the last failed payment attempt
    pub last_error: Option<String>,
    pub created: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub intent_id: String,
    /// Refunds are issued against the charge when it is known, and against the intent otherwise
    pub charge_id: Option<String>,
    /// A partial refund amount. `None` refunds in full.
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub amount: Money,
    pub status: String,
}

/// A charge that the gateway reports as refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundedCharge {
    pub charge: ChargeDetails,
    pub intent_id: Option<String>,
    pub amount_refunded: Money,
}

/// A verified webhook notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    pub id: String,
    pub kind: GatewayEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    IntentSucceeded(GatewayIntent),
    IntentFailed(GatewayIntent),
    IntentCanceled(GatewayIntent),
    ChargeRefunded(RefundedCharge),
    /// Any event type that the engine does not act on
    Unrecognized(String),
}

/// The card payment provider.
///
/// Implementations must bound every call with a timeout, and report it as [`GatewayError::Timeout`].
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Opens a remote payment intent for the amount, in minor units.
    async fn create_intent(&self, intent: NewPaymentIntent) -> Result<GatewayIntent, GatewayError>;

    /// Fetches the current state of the intent, including the details of its latest charge.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError>;

    async fn create_refund(&self, refund: RefundRequest) -> Result<GatewayRefund, GatewayError>;
}
