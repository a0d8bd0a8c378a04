use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::StripeApiError;

//--------------------------------------   Payment intents   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Unix timestamp, in seconds
    pub created: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub latest_charge: Option<ExpandableCharge>,
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
}

impl PaymentIntent {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created, 0).unwrap_or_default()
    }

    /// The latest charge, if it was expanded in the response
    pub fn charge(&self) -> Option<&Charge> {
        match &self.latest_charge {
            Some(ExpandableCharge::Object(charge)) => Some(charge.as_ref()),
            _ => None,
        }
    }

    pub fn charge_id(&self) -> Option<&str> {
        self.latest_charge.as_ref().map(|c| c.id())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.last_payment_error.as_ref().and_then(|e| e.message.as_deref())
    }
}

/// Stripe returns either the charge id or, when `expand[]=latest_charge` is requested, the full object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpandableCharge {
    Id(String),
    Object(Box<Charge>),
}

impl ExpandableCharge {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id.as_str(),
            Self::Object(charge) => charge.id.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The parameters for a new payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIntent {
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

//--------------------------------------        Charges       --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_method_details: Option<PaymentMethodDetails>,
}

impl Charge {
    pub fn payment_method_type(&self) -> Option<&str> {
        self.payment_method_details.as_ref().map(|d| d.kind.as_str())
    }

    pub fn card_last4(&self) -> Option<&str> {
        self.payment_method_details.as_ref().and_then(|d| d.card.as_ref()).and_then(|c| c.last4.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodDetails {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub card: Option<CardDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
}

//--------------------------------------        Refunds       --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub charge: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

//--------------------------------------        Events        --------------------------------------------------------
/// The envelope of a webhook delivery. The payload object is kept as raw JSON until the event type is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn payment_intent(&self) -> Result<PaymentIntent, StripeApiError> {
        self.object_as("payment_intent")
    }

    pub fn charge(&self) -> Result<Charge, StripeApiError> {
        self.object_as("charge")
    }

    fn object_as<T: DeserializeOwned>(&self, expected: &str) -> Result<T, StripeApiError> {
        let object = self.data.object.get("object").and_then(|v| v.as_str()).unwrap_or_default();
        if object != expected {
            return Err(StripeApiError::InvalidEvent(format!(
                "Event {} ({}) carries a '{object}' object, but a '{expected}' was expected",
                self.id, self.event_type
            )));
        }
        serde_json::from_value(self.data.object.clone()).map_err(|e| StripeApiError::JsonError(e.to_string()))
    }
}
