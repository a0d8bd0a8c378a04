use std::{collections::HashMap, fmt::Debug};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    api::{
        errors::OrderFlowError,
        payment_objects::{
            ConfirmPaymentResult,
            PaymentIntentCreated,
            PaymentStatusReport,
            ReconciliationSummary,
            RefundResult,
        },
    },
    config::OrderFlowConfig,
    db_types::{Money, NewOrderItem, NewTransaction, Order, OrderDetails, OrderStatusType, TransactionState},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent, PaymentFailedEvent},
    helpers::check_order_payable,
    traits::{
        AccountManagement,
        DeletedOrder,
        GatewayEvent,
        GatewayEventKind,
        GatewayIntent,
        NewPaymentIntent,
        OrderFlowDatabase,
        PaymentGateway,
        RefundRequest,
        SettlementOutcome,
        SettlementUpdate,
        StateChange,
    },
};

const DECLINED_MESSAGE: &str = "Payment declined";
/// A refund claim older than this was left behind by a refund that never finished
const REFUND_CLAIM_TTL_MINS: i64 = 10;

/// `OrderFlowApi` is the reconciliation engine. It handles orders and card payments in response to customer
/// requests, staff actions and gateway notifications.
///
/// Calls to the payment gateway are made outside of any database transaction. The local record only changes after the
/// gateway has answered, so a gateway failure leaves local state untouched.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    config: OrderFlowConfig,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.config)
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers, config: OrderFlowConfig) -> Self {
        Self { db, gateway, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &OrderFlowConfig {
        &self.config
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    /// Creates a cash order for the user, priced at the current catalog prices. Loyalty points are awarded
    /// immediately.
    pub async fn create_order(&self, user_id: i64, items: &[NewOrderItem]) -> Result<OrderDetails, OrderFlowError> {
        let order = self.db.create_order(user_id, items, &self.config).await?;
        info!(
            "🔄️📦️ Order #{} created for user #{user_id}. {} items, total {}",
            order.order.id,
            order.items.len(),
            order.order.total_price
        );
        Ok(order)
    }

    /// Opens a payment intent with the gateway and records it locally as a `pending` transaction.
    ///
    /// If `order_id` is given, the order must belong to the user, still be pending, and cost `amount`.
    pub async fn create_payment_intent(
        &self,
        user_id: i64,
        amount: Money,
        description: Option<String>,
        order_id: Option<i64>,
    ) -> Result<PaymentIntentCreated, OrderFlowError> {
        if !amount.is_positive() {
            return Err(OrderFlowError::InvalidAmount(format!("{amount} is not a valid payment amount")));
        }
        if amount < self.config.minimum_charge {
            return Err(OrderFlowError::BelowMinimumCharge { amount, minimum: self.config.minimum_charge });
        }
        self.db.fetch_user_account(user_id).await?.ok_or(OrderFlowError::UserNotFound(user_id))?;
        // Checked here so that no intent is opened for an order that can't take it. The store checks again.
        if let Some(order_id) = order_id {
            let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
            check_order_payable(&order.order, user_id, amount, self.config.amount_tolerance)?;
        }
        let description = description.filter(|d| !d.trim().is_empty()).unwrap_or_else(|| match order_id {
            Some(id) => format!("Payment for order #{id}"),
            None => "Card payment".to_string(),
        });
        let mut metadata = HashMap::from([("userId".to_string(), user_id.to_string())]);
        if let Some(order_id) = order_id {
            metadata.insert("orderId".to_string(), order_id.to_string());
        }
        let request =
            NewPaymentIntent { amount, currency: self.config.currency.clone(), description: description.clone(), metadata };
        let intent = self.gateway.create_intent(request).await?;
        debug!("🔄️💳️ Payment intent {} opened for {amount} {}", intent.id, self.config.currency);
        let transaction = NewTransaction {
            user_id,
            order_id,
            external_id: intent.id.clone(),
            amount,
            currency: self.config.currency.clone(),
            description,
        };
        let record = self.db.insert_pending_transaction(transaction, &self.config).await?.into_transaction();
        info!("🔄️💳️ Transaction #{} recorded for payment intent {}", record.id, record.external_id);
        Ok(PaymentIntentCreated {
            client_secret: intent.client_secret,
            transaction_id: record.id,
            payment_intent_id: intent.id,
            amount,
            currency: record.currency,
        })
    }

    /// Client-driven confirmation. The intent's state is fetched from the gateway, never taken from the client, and
    /// applied through the settlement applier.
    ///
    /// For a payment-first order, `items` describes the order to create once the payment has succeeded.
    pub async fn confirm_payment(
        &self,
        user_id: i64,
        intent_id: &str,
        order_id: Option<i64>,
        items: Vec<NewOrderItem>,
    ) -> Result<ConfirmPaymentResult, OrderFlowError> {
        let local = self
            .db
            .fetch_transaction(intent_id)
            .await?
            .filter(|tx| tx.user_id == user_id)
            .ok_or_else(|| OrderFlowError::TransactionNotFound(intent_id.to_string()))?;
        trace!("🔄️✅️ Confirming payment {intent_id}. Local state is {}", local.state);
        let intent = self.gateway.retrieve_intent(intent_id).await?;
        let update = settlement_from_intent(&intent).with_order_id(order_id).with_items(items);
        let outcome = self.settle(update).await?;
        let client_secret =
            if outcome.transaction.state == TransactionState::RequiresAction { intent.client_secret } else { None };
        debug!(
            "🔄️✅️ Payment {intent_id} confirmed as {} (gateway status: {})",
            outcome.transaction.state,
            intent.status.as_str()
        );
        Ok(ConfirmPaymentResult {
            status: outcome.transaction.state,
            gateway_status: intent.status.as_str().to_string(),
            change: outcome.change,
            transaction: outcome.transaction,
            order: outcome.order,
            client_secret,
        })
    }

    /// Applies a verified gateway notification.
    ///
    /// Notifications for payments that have no local transaction are logged and dropped, as are event types that
    /// the engine does not act on. In both cases `Ok(None)` is returned.
    pub async fn apply_webhook_event(&self, event: GatewayEvent) -> Result<Option<SettlementOutcome>, OrderFlowError> {
        trace!("🔄️📬️ Applying webhook event {}", event.id);
        let update = match event.kind {
            GatewayEventKind::IntentSucceeded(intent) => settlement_for(&intent, TransactionState::Succeeded),
            GatewayEventKind::IntentFailed(intent) => settlement_for(&intent, TransactionState::Failed),
            GatewayEventKind::IntentCanceled(intent) => settlement_for(&intent, TransactionState::Canceled),
            GatewayEventKind::ChargeRefunded(refunded) => {
                let by_intent = match &refunded.intent_id {
                    Some(intent_id) => self.db.fetch_transaction(intent_id).await?,
                    None => None,
                };
                let tx = match by_intent {
                    Some(tx) => Some(tx),
                    None => self.db.fetch_transaction_by_charge_id(&refunded.charge.id).await?,
                };
                let Some(tx) = tx else {
                    warn!(
                        "🔄️📬️ Charge {} was refunded, but there is no transaction for it. Ignoring event {}",
                        refunded.charge.id, event.id
                    );
                    return Ok(None);
                };
                SettlementUpdate::new(tx.external_id, TransactionState::Refunded)
                    .with_charge(Some(refunded.charge))
                    .with_refunded_amount(refunded.amount_refunded)
            },
            GatewayEventKind::Unrecognized(kind) => {
                info!("🔄️📬️ Ignoring webhook event {} of type {kind}", event.id);
                return Ok(None);
            },
        };
        match self.settle(update).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(OrderFlowError::TransactionNotFound(intent_id)) => {
                warn!("🔄️📬️ There is no transaction for payment intent {intent_id}. Ignoring event {}", event.id);
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Refunds a succeeded payment, in full unless `amount` is given, and cancels the order it paid for.
    ///
    /// Loyalty points that the order earned are kept.
    ///
    /// The payment is claimed before the gateway is called, so a concurrent second refund fails with
    /// [`OrderFlowError::AlreadyRefunded`] instead of reaching the gateway. The claim is dropped if the refund fails.
    pub async fn refund_payment(&self, intent_id: &str, amount: Option<Money>) -> Result<RefundResult, OrderFlowError> {
        let stale_before = Utc::now() - Duration::minutes(REFUND_CLAIM_TTL_MINS);
        let tx = self.db.claim_refund(intent_id, stale_before).await?;
        let amount = amount.unwrap_or(tx.amount);
        if !amount.is_positive() || amount > tx.amount {
            self.db.release_refund(intent_id).await?;
            return Err(OrderFlowError::InvalidAmount(format!(
                "A refund of {amount} is not possible for a payment of {}",
                tx.amount
            )));
        }
        let request = RefundRequest {
            intent_id: intent_id.to_string(),
            charge_id: tx.charge_id.clone(),
            amount: (amount != tx.amount).then_some(amount),
        };
        let refund = match self.gateway.create_refund(request).await {
            Ok(refund) => refund,
            Err(e) => {
                warn!("🔄️💸️ Refund of {amount} for payment {intent_id} failed at the gateway. {e}");
                self.db.release_refund(intent_id).await?;
                return Err(e.into());
            },
        };
        info!("🔄️💸️ Refund {} of {amount} issued for payment {intent_id}", refund.id);
        let update = SettlementUpdate::new(intent_id, TransactionState::Refunded).with_refunded_amount(amount);
        let outcome = self.settle(update).await?;
        Ok(RefundResult {
            refund_id: refund.id,
            amount: refund.amount,
            refund_status: refund.status,
            transaction: outcome.transaction,
            order: outcome.order,
        })
    }

    /// Compares the gateway's view of a payment with the local record. Nothing is changed.
    pub async fn check_payment_status(&self, intent_id: &str) -> Result<PaymentStatusReport, OrderFlowError> {
        let tx = self
            .db
            .fetch_transaction(intent_id)
            .await?
            .ok_or_else(|| OrderFlowError::TransactionNotFound(intent_id.to_string()))?;
        let intent = self.gateway.retrieve_intent(intent_id).await?;
        Ok(PaymentStatusReport {
            payment_intent_id: intent.id,
            user_id: tx.user_id,
            status: intent.status.as_str().to_string(),
            db_status: tx.state,
            amount: intent.amount,
            currency: intent.currency,
            created: intent.created,
            error: intent.last_error.or(tx.error_message),
        })
    }

    pub async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderFlowError> {
        let order = self.db.update_order_status(order_id, status).await?;
        info!("🔄️📦️ Order #{order_id} is now {}", order.status);
        Ok(order)
    }

    pub async fn delete_order(&self, order_id: i64) -> Result<DeletedOrder, OrderFlowError> {
        self.db.delete_order_cascade(order_id).await
    }

    /// Re-polls the gateway for payments that have been waiting longer than `max_age`, and settles whatever the
    /// gateway reports. Failures are logged and counted, and do not stop the pass.
    pub async fn reconcile_stale_payments(&self, max_age: Duration) -> Result<ReconciliationSummary, OrderFlowError> {
        let cutoff = Utc::now() - max_age;
        let stale = self.db.fetch_stale_transactions(cutoff).await?;
        let mut summary = ReconciliationSummary { checked: stale.len(), ..Default::default() };
        for tx in stale {
            let result = match self.gateway.retrieve_intent(&tx.external_id).await {
                Ok(intent) => self.settle(settlement_from_intent(&intent)).await,
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(outcome) if outcome.change == StateChange::Applied => {
                    debug!("🔄️🕰️ Stale payment {} is now {}", tx.external_id, outcome.transaction.state);
                    summary.updated += 1;
                },
                Ok(_) => trace!("🔄️🕰️ Stale payment {} is still {}", tx.external_id, tx.state),
                Err(e) => {
                    warn!("🔄️🕰️ Could not reconcile payment {}. {e}", tx.external_id);
                    summary.failed += 1;
                },
            }
        }
        Ok(summary)
    }

    async fn settle(&self, update: SettlementUpdate) -> Result<SettlementOutcome, OrderFlowError> {
        let outcome = self.db.apply_settlement(update, &self.config).await?;
        self.notify(&outcome).await;
        Ok(outcome)
    }

    async fn notify(&self, outcome: &SettlementOutcome) {
        if let Some(order) = &outcome.order {
            if outcome.order_paid() {
                debug!("🔄️📬️ Notifying order paid hook subscribers");
                let event = OrderPaidEvent::new(order.order.clone(), outcome.transaction.clone());
                self.producers.publish_order_paid(event).await;
            }
            if outcome.order_cancelled {
                debug!("🔄️📬️ Notifying order annulled hook subscribers");
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.order.clone())).await;
            }
        }
        let failed = matches!(outcome.transaction.state, TransactionState::Failed | TransactionState::Canceled);
        if failed && outcome.change == StateChange::Applied {
            self.producers.publish_payment_failed(PaymentFailedEvent::new(outcome.transaction.clone())).await;
        }
    }
}

/// Builds a settlement from the gateway's view of an intent.
fn settlement_from_intent(intent: &GatewayIntent) -> SettlementUpdate {
    settlement_for(intent, intent.status.settlement_state())
}

fn settlement_for(intent: &GatewayIntent, state: TransactionState) -> SettlementUpdate {
    let error_message = match state {
        TransactionState::Failed => Some(intent.last_error.clone().unwrap_or_else(|| DECLINED_MESSAGE.to_string())),
        _ => None,
    };
    SettlementUpdate::new(intent.id.clone(), state).with_charge(intent.charge.clone()).with_error_message(error_message)
}
