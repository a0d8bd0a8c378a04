use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::Utc;

use crate::{
    db_types::Money,
    traits::{
        ChargeDetails,
        GatewayError,
        GatewayIntent,
        GatewayIntentStatus,
        GatewayRefund,
        NewPaymentIntent,
        PaymentGateway,
        RefundRequest,
    },
};

#[derive(Default)]
struct GatewayState {
    intents: HashMap<String, GatewayIntent>,
    refunds: Vec<RefundRequest>,
    offline: bool,
    calls: usize,
}

/// An in-memory payment gateway that tests can script. Clones share state.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, every call fails with a timeout.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Number of calls that reached the gateway, including failed ones.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn intent(&self, intent_id: &str) -> Option<GatewayIntent> {
        self.state.lock().unwrap().intents.get(intent_id).cloned()
    }

    pub fn refunds(&self) -> Vec<RefundRequest> {
        self.state.lock().unwrap().refunds.clone()
    }

    pub fn set_status(&self, intent_id: &str, status: GatewayIntentStatus) -> GatewayIntent {
        self.update(intent_id, |intent| intent.status = status)
    }

    /// The customer paid by card. The intent now carries a charge.
    pub fn succeed(&self, intent_id: &str) -> GatewayIntent {
        self.update(intent_id, |intent| {
            intent.status = GatewayIntentStatus::Succeeded;
            intent.charge = Some(ChargeDetails {
                id: format!("ch_{}", intent.id.trim_start_matches("pi_")),
                payment_method_type: Some("card".to_string()),
                last4: Some("4242".to_string()),
            });
        })
    }

    /// The card was declined.
    pub fn decline(&self, intent_id: &str, message: &str) -> GatewayIntent {
        self.update(intent_id, |intent| {
            intent.status = GatewayIntentStatus::RequiresPaymentMethod;
            intent.last_error = Some(message.to_string());
        })
    }

    fn update<F: FnOnce(&mut GatewayIntent)>(&self, intent_id: &str, f: F) -> GatewayIntent {
        let mut state = self.state.lock().unwrap();
        let intent = state.intents.get_mut(intent_id).expect("No such intent in the fake gateway");
        f(intent);
        intent.clone()
    }

    fn begin_call(&self) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.offline {
            Err(GatewayError::Timeout("The fake gateway is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, intent: NewPaymentIntent) -> Result<GatewayIntent, GatewayError> {
        self.begin_call()?;
        let id = format!("pi_{:016x}", rand::random::<u64>());
        let result = GatewayIntent {
            client_secret: Some(format!("{id}_secret_{:08x}", rand::random::<u32>())),
            id: id.clone(),
            amount: intent.amount,
            currency: intent.currency,
            status: GatewayIntentStatus::RequiresPaymentMethod,
            charge: None,
            last_error: None,
            created: Utc::now(),
            metadata: intent.metadata,
        };
        self.state.lock().unwrap().intents.insert(id, result.clone());
        Ok(result)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, GatewayError> {
        self.begin_call()?;
        self.intent(intent_id)
            .ok_or_else(|| GatewayError::Rejected { status: 404, message: format!("No such payment_intent: {intent_id}") })
    }

    async fn create_refund(&self, refund: RefundRequest) -> Result<GatewayRefund, GatewayError> {
        self.begin_call()?;
        let intent = self.intent(&refund.intent_id).ok_or_else(|| GatewayError::Rejected {
            status: 404,
            message: format!("No such payment_intent: {}", refund.intent_id),
        })?;
        let amount: Money = refund.amount.unwrap_or(intent.amount);
        self.state.lock().unwrap().refunds.push(refund);
        Ok(GatewayRefund { id: format!("re_{:016x}", rand::random::<u64>()), amount, status: "succeeded".to_string() })
    }
}
