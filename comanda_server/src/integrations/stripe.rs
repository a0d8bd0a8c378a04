//! The Stripe implementation of the engine's [`PaymentGateway`].
//!
//! [`StripeGateway`] wraps the REST client from `stripe_tools` and converts Stripe objects into the gateway types the
//! order engine works with. [`gateway_event`] does the same for webhook deliveries, once their signature has been
//! checked.
use comanda_engine::{
    db_types::Money,
    traits::{
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
    },
};
use log::*;
use stripe_tools::{Charge, NewIntent, PaymentIntent, StripeApi, StripeApiError, StripeConfig, WebhookEvent};

pub const INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const INTENT_FAILED: &str = "payment_intent.payment_failed";
pub const INTENT_CANCELED: &str = "payment_intent.canceled";
pub const CHARGE_REFUNDED: &str = "charge.refunded";

#[derive(Clone)]
pub struct StripeGateway {
    api: StripeApi,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let api = StripeApi::new(config)?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &StripeApi {
        &self.api
    }
}

impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, intent: NewPaymentIntent) -> Result<GatewayIntent, GatewayError> {
        let request = NewIntent {
            amount: intent.amount.value(),
            currency: intent.currency,
            description: intent.description,
            metadata: intent.metadata,
        };
        let intent = self.api.create_payment_intent(request).await.map_err(gateway_error)?;
        Ok(intent_from_stripe(intent))
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError> {
        let intent = self.api.retrieve_payment_intent(intent_id).await.map_err(gateway_error)?;
        Ok(intent_from_stripe(intent))
    }

    async fn create_refund(&self, refund: RefundRequest) -> Result<GatewayRefund, GatewayError> {
        let amount = refund.amount.map(|a| a.value());
        let result = self
            .api
            .create_refund(&refund.intent_id, refund.charge_id.as_deref(), amount)
            .await
            .map_err(gateway_error)?;
        Ok(GatewayRefund {
            id: result.id,
            amount: Money::from(result.amount),
            status: result.status.unwrap_or_else(|| "pending".to_string()),
        })
    }
}

pub fn gateway_error(e: StripeApiError) -> GatewayError {
    match e {
        StripeApiError::Timeout(s) => GatewayError::Timeout(s),
        StripeApiError::RestRequestError(s) => GatewayError::Network(s),
        StripeApiError::QueryError { status, message } => GatewayError::Rejected { status, message },
        other => GatewayError::InvalidResponse(other.to_string()),
    }
}

pub fn intent_status(status: &str) -> GatewayIntentStatus {
    serde_json::from_value(serde_json::Value::String(status.to_string()))
        .unwrap_or_else(|_| GatewayIntentStatus::Other(status.to_string()))
}

pub fn intent_from_stripe(intent: PaymentIntent) -> GatewayIntent {
    let charge = intent.charge().map(charge_details).or_else(|| {
        intent.charge_id().map(|id| ChargeDetails { id: id.to_string(), payment_method_type: None, last4: None })
    });
    let last_error = intent.error_message().map(String::from);
    let created = intent.created_at();
    GatewayIntent {
        status: intent_status(&intent.status),
        id: intent.id,
        client_secret: intent.client_secret,
        amount: Money::from(intent.amount),
        currency: intent.currency,
        charge,
        last_error,
        created,
        metadata: intent.metadata,
    }
}

fn charge_details(charge: &Charge) -> ChargeDetails {
    ChargeDetails {
        id: charge.id.clone(),
        payment_method_type: charge.payment_method_type().map(String::from),
        last4: charge.card_last4().map(String::from),
    }
}

/// Converts a verified webhook delivery into a gateway event. Event types the engine doesn't handle become
/// [`GatewayEventKind::Unrecognized`].
pub fn gateway_event(event: WebhookEvent) -> Result<GatewayEvent, StripeApiError> {
    let kind = match event.event_type.as_str() {
        INTENT_SUCCEEDED => GatewayEventKind::IntentSucceeded(intent_from_stripe(event.payment_intent()?)),
        INTENT_FAILED => GatewayEventKind::IntentFailed(intent_from_stripe(event.payment_intent()?)),
        INTENT_CANCELED => GatewayEventKind::IntentCanceled(intent_from_stripe(event.payment_intent()?)),
        CHARGE_REFUNDED => {
            let charge = event.charge()?;
            GatewayEventKind::ChargeRefunded(RefundedCharge {
                charge: charge_details(&charge),
                intent_id: charge.payment_intent.clone(),
                amount_refunded: Money::from(charge.amount_refunded),
            })
        },
        other => {
            trace!("📬️ Stripe event {} has type {other}", event.id);
            GatewayEventKind::Unrecognized(other.to_string())
        },
    };
    Ok(GatewayEvent { id: event.id, kind })
}
