use chrono::Duration;
use comanda_engine::{
    db_types::{Money, OrderStatusType, PaymentMethod, TransactionState},
    test_utils::seed::count_rows,
    traits::{
        AccountManagement,
        GatewayEvent,
        GatewayEventKind,
        GatewayIntentStatus,
        OrderFlowDatabase,
        StateChange,
    },
    ErrorCategory,
    OrderFlowError,
};

mod support;

use support::{setup, Fixture};

fn event(kind: GatewayEventKind) -> GatewayEvent {
    GatewayEvent { id: format!("evt_{}", rand_suffix()), kind }
}

fn rand_suffix() -> u32 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().subsec_nanos()
}

/// A pending order of 170.00 with an open payment intent for it
async fn order_with_intent(fx: &Fixture) -> (i64, String) {
    let order = fx.api.create_order(fx.customer, &fx.two_tacos()).await.unwrap();
    let intent = fx
        .api
        .create_payment_intent(fx.customer, order.order.total_price, None, Some(order.order.id))
        .await
        .expect("Error creating payment intent");
    (order.order.id, intent.payment_intent_id)
}

#[tokio::test]
async fn create_intent_records_a_pending_transaction() {
    let fx = setup().await;
    let intent = fx
        .api
        .create_payment_intent(fx.customer, Money::from(17_000), Some("Mesa 4".into()), None)
        .await
        .unwrap();
    assert!(intent.client_secret.is_some());
    assert_eq!(intent.currency, "usd");
    let tx = fx.db().fetch_transaction(&intent.payment_intent_id).await.unwrap().unwrap();
    assert_eq!(tx.id, intent.transaction_id);
    assert_eq!(tx.state, TransactionState::Pending);
    assert_eq!(tx.amount, Money::from(17_000));
    assert_eq!(tx.description, "Mesa 4");
    assert_eq!(tx.order_id, None);
    let remote = fx.gateway().intent(&intent.payment_intent_id).unwrap();
    assert_eq!(remote.metadata.get("userId"), Some(&fx.customer.to_string()));
    fx.tear_down().await;
}

#[tokio::test]
async fn intents_are_validated_before_the_gateway_is_called() {
    let fx = setup().await;
    let err = fx.api.create_payment_intent(fx.customer, Money::from(49), None, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::BelowMinimumCharge { .. }));
    let err = fx.api.create_payment_intent(fx.customer, Money::from(-100), None, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidAmount(_)));

    let order = fx.api.create_order(fx.customer, &fx.two_tacos()).await.unwrap();
    let err =
        fx.api.create_payment_intent(fx.other_customer, Money::from(17_000), None, Some(order.order.id)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderMismatch(_)));
    let err =
        fx.api.create_payment_intent(fx.customer, Money::from(10_000), None, Some(order.order.id)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::AmountMismatch { .. }));
    assert_eq!(err.category(), ErrorCategory::Conflict);
    let err = fx.api.create_payment_intent(fx.customer, Money::from(17_000), None, Some(999)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotFound(999)));

    assert_eq!(fx.gateway().calls(), 0);
    assert_eq!(count_rows(fx.db(), "transactions").await, 0);
    fx.tear_down().await;
}

#[tokio::test]
async fn confirmed_payment_sends_the_order_to_the_kitchen() {
    let fx = setup().await;
    let (order_id, intent_id) = order_with_intent(&fx).await;
    fx.gateway().succeed(&intent_id);
    let result = fx.api.confirm_payment(fx.customer, &intent_id, None, vec![]).await.unwrap();
    assert_eq!(result.status, TransactionState::Succeeded);
    assert_eq!(result.change, StateChange::Applied);
    assert_eq!(result.client_secret, None);
    assert_eq!(result.transaction.card_last4.as_deref(), Some("4242"));
    assert_eq!(result.transaction.payment_method_type.as_deref(), Some("card"));
    assert!(result.transaction.charge_id.is_some());
    assert!(result.transaction.confirmed_at.is_some());

    let order = result.order.expect("The order should be returned");
    assert_eq!(order.order.id, order_id);
    assert_eq!(order.order.status, OrderStatusType::InPreparation);
    assert_eq!(order.order.payment_method, PaymentMethod::Card);
    // Points were earned when the order was placed, not again at payment
    assert_eq!(fx.balance(fx.customer).await, 17);
    assert_eq!(count_rows(fx.db(), "loyalty_log").await, 1);
    fx.tear_down().await;
}

#[tokio::test]
async fn confirmations_are_not_trusted_from_the_client() {
    let fx = setup().await;
    let (order_id, intent_id) = order_with_intent(&fx).await;
    // The gateway still says the customer hasn't paid
    let result = fx.api.confirm_payment(fx.customer, &intent_id, None, vec![]).await.unwrap();
    assert_eq!(result.status, TransactionState::Failed);
    assert_eq!(result.transaction.error_message.as_deref(), Some("Payment declined"));
    let order = fx.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.order.status, OrderStatusType::Pending);

    let err = fx.api.confirm_payment(fx.other_customer, &intent_id, None, vec![]).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::TransactionNotFound(_)));
    fx.tear_down().await;
}

#[tokio::test]
async fn declines_and_authentication_steps() {
    let fx = setup().await;
    let (_, intent_id) = order_with_intent(&fx).await;
    fx.gateway().set_status(&intent_id, GatewayIntentStatus::RequiresAction);
    let result = fx.api.confirm_payment(fx.customer, &intent_id, None, vec![]).await.unwrap();
    assert_eq!(result.status, TransactionState::RequiresAction);
    assert!(result.client_secret.is_some());

    fx.gateway().decline(&intent_id, "Your card was declined.");
    let result = fx.api.confirm_payment(fx.customer, &intent_id, None, vec![]).await.unwrap();
    assert_eq!(result.status, TransactionState::Failed);
    assert_eq!(result.gateway_status, "requires_payment_method");
    assert_eq!(result.transaction.error_message.as_deref(), Some("Your card was declined."));
    assert!(result.transaction.failed_at.is_some());
    fx.tear_down().await;
}

#[tokio::test]
async fn payment_first_orders_are_created_on_settlement() {
    let fx = setup().await;
    let intent = fx.api.create_payment_intent(fx.customer, Money::from(17_000), None, None).await.unwrap();
    let id = intent.payment_intent_id;
    let succeeded = fx.gateway().succeed(&id);

    // The webhook arrives first. It has no line items, so there is no order yet.
    let outcome = fx.api.apply_webhook_event(event(GatewayEventKind::IntentSucceeded(succeeded))).await.unwrap();
    let outcome = outcome.expect("The event should be applied");
    assert_eq!(outcome.change, StateChange::Applied);
    assert!(outcome.order.is_none());

    let result = fx.api.confirm_payment(fx.customer, &id, None, fx.two_tacos()).await.unwrap();
    assert_eq!(result.change, StateChange::AlreadyApplied);
    let order = result.order.expect("The order should be created");
    assert_eq!(order.order.status, OrderStatusType::InPreparation);
    assert_eq!(order.order.payment_method, PaymentMethod::Card);
    assert_eq!(order.order.total_price, Money::from(17_000));
    assert_eq!(result.transaction.order_id, Some(order.order.id));

    // A repeated confirmation finds the order instead of creating another one
    let again = fx.api.confirm_payment(fx.customer, &id, None, fx.two_tacos()).await.unwrap();
    assert_eq!(again.order.map(|o| o.order.id), Some(order.order.id));
    assert_eq!(count_rows(fx.db(), "orders").await, 1);
    assert_eq!(count_rows(fx.db(), "loyalty_log").await, 1);
    assert_eq!(fx.balance(fx.customer).await, 17);
    fx.tear_down().await;
}

#[tokio::test]
async fn settled_amount_must_match_the_order() {
    let fx = setup().await;
    let intent = fx.api.create_payment_intent(fx.customer, Money::from(10_000), None, None).await.unwrap();
    let id = intent.payment_intent_id;
    fx.gateway().succeed(&id);
    let err = fx.api.confirm_payment(fx.customer, &id, None, fx.two_tacos()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::AmountMismatch { .. }));
    assert_eq!(err.category(), ErrorCategory::Conflict);
    // Nothing was written, not even the state change
    let tx = fx.db().fetch_transaction(&id).await.unwrap().unwrap();
    assert_eq!(tx.state, TransactionState::Pending);
    assert_eq!(count_rows(fx.db(), "orders").await, 0);
    assert_eq!(fx.balance(fx.customer).await, 0);
    fx.tear_down().await;
}

#[tokio::test]
async fn a_named_order_is_linked_on_confirmation() {
    let fx = setup().await;
    let order = fx.api.create_order(fx.customer, &fx.two_tacos()).await.unwrap();
    let intent = fx.api.create_payment_intent(fx.customer, Money::from(17_000), None, None).await.unwrap();
    let id = intent.payment_intent_id;
    fx.gateway().succeed(&id);
    let result = fx.api.confirm_payment(fx.customer, &id, Some(order.order.id), vec![]).await.unwrap();
    assert_eq!(result.transaction.order_id, Some(order.order.id));
    assert_eq!(result.order.unwrap().order.status, OrderStatusType::InPreparation);

    let other = fx.api.create_order(fx.customer, &fx.two_tacos()).await.unwrap();
    let err = fx.api.confirm_payment(fx.customer, &id, Some(other.order.id), vec![]).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderMismatch(_)));
    fx.tear_down().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_webhooks_settle_once() {
    let fx = setup().await;
    let (order_id, intent_id) = order_with_intent(&fx).await;
    let succeeded = fx.gateway().succeed(&intent_id);
    let first = fx.api.apply_webhook_event(event(GatewayEventKind::IntentSucceeded(succeeded.clone())));
    let second = fx.api.apply_webhook_event(event(GatewayEventKind::IntentSucceeded(succeeded)));
    let (first, second) = tokio::join!(first, second);
    let outcomes = [first.unwrap().unwrap(), second.unwrap().unwrap()];
    let applied = outcomes.iter().filter(|o| o.change == StateChange::Applied).count();
    let advanced = outcomes.iter().filter(|o| o.order_advanced).count();
    assert_eq!(applied, 1);
    assert_eq!(advanced, 1);
    for outcome in &outcomes {
        assert_eq!(outcome.transaction.state, TransactionState::Succeeded);
        assert_eq!(outcome.order.as_ref().unwrap().order.status, OrderStatusType::InPreparation);
    }
    let order = fx.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.order.status, OrderStatusType::InPreparation);
    fx.tear_down().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_confirmations_create_one_order() {
    let fx = setup().await;
    let intent = fx.api.create_payment_intent(fx.customer, Money::from(17_000), None, None).await.unwrap();
    let id = intent.payment_intent_id;
    let succeeded = fx.gateway().succeed(&id);
    let confirm = fx.api.confirm_payment(fx.customer, &id, None, fx.two_tacos());
    let webhook = fx.api.apply_webhook_event(event(GatewayEventKind::IntentSucceeded(succeeded)));
    let confirm_again = fx.api.confirm_payment(fx.customer, &id, None, fx.two_tacos());
    let (a, b, c) = tokio::join!(confirm, webhook, confirm_again);
    let (a, c) = (a.unwrap(), c.unwrap());
    b.unwrap();
    assert_eq!(a.order.as_ref().map(|o| o.order.id), c.order.as_ref().map(|o| o.order.id));
    assert_eq!(count_rows(fx.db(), "orders").await, 1);
    assert_eq!(count_rows(fx.db(), "order_items").await, 1);
    assert_eq!(count_rows(fx.db(), "loyalty_log").await, 1);
    assert_eq!(fx.balance(fx.customer).await, 17);
    assert!(fx.audit(fx.customer).await.is_consistent());
    fx.tear_down().await;
}

#[tokio::test]
async fn stale_and_unknown_notifications_are_ignored() {
    let fx = setup().await;
    let (_, intent_id) = order_with_intent(&fx).await;
    let succeeded = fx.gateway().succeed(&intent_id);
    fx.api.apply_webhook_event(event(GatewayEventKind::IntentSucceeded(succeeded.clone()))).await.unwrap();

    // A late failure report can't undo a success
    let outcome = fx.api.apply_webhook_event(event(GatewayEventKind::IntentFailed(succeeded.clone()))).await.unwrap();
    assert_eq!(outcome.unwrap().change, StateChange::Ignored);
    let tx = fx.db().fetch_transaction(&intent_id).await.unwrap().unwrap();
    assert_eq!(tx.state, TransactionState::Succeeded);

    let mut stranger = succeeded;
    stranger.id = "pi_unknown".to_string();
    let outcome = fx.api.apply_webhook_event(event(GatewayEventKind::IntentSucceeded(stranger))).await.unwrap();
    assert!(outcome.is_none());

    let outcome =
        fx.api.apply_webhook_event(event(GatewayEventKind::Unrecognized("customer.created".into()))).await.unwrap();
    assert!(outcome.is_none());
    fx.tear_down().await;
}

#[tokio::test]
async fn canceled_intents_are_annotated() {
    let fx = setup().await;
    let intent = fx.api.create_payment_intent(fx.customer, Money::from(5_000), Some("Propina".into()), None).await.unwrap();
    let canceled = fx.gateway().set_status(&intent.payment_intent_id, GatewayIntentStatus::Canceled);
    let outcome = fx.api.apply_webhook_event(event(GatewayEventKind::IntentCanceled(canceled))).await.unwrap().unwrap();
    assert_eq!(outcome.transaction.state, TransactionState::Canceled);
    assert_eq!(outcome.transaction.description, "Propina - Canceled");
    fx.tear_down().await;
}

#[tokio::test]
async fn gateway_outages_change_nothing() {
    let fx = setup().await;
    let (order_id, intent_id) = order_with_intent(&fx).await;
    fx.gateway().succeed(&intent_id);
    fx.gateway().set_offline(true);
    let err = fx.api.confirm_payment(fx.customer, &intent_id, None, vec![]).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Gateway);
    assert!(err.is_retryable());
    let err = fx.api.create_payment_intent(fx.customer, Money::from(1_000), None, None).await.unwrap_err();
    assert!(err.is_retryable());

    let tx = fx.db().fetch_transaction(&intent_id).await.unwrap().unwrap();
    assert_eq!(tx.state, TransactionState::Pending);
    assert_eq!(count_rows(fx.db(), "transactions").await, 1);
    let order = fx.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.order.status, OrderStatusType::Pending);

    // Once the gateway is back, a poll reconciles the payment
    fx.gateway().set_offline(false);
    let report = fx.api.check_payment_status(&intent_id).await.unwrap();
    assert_eq!(report.status, "succeeded");
    assert_eq!(report.db_status, TransactionState::Pending);
    assert_eq!(report.user_id, fx.customer);
    let summary = fx.api.reconcile_stale_payments(Duration::zero()).await.unwrap();
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, 0);
    let order = fx.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.order.status, OrderStatusType::InPreparation);
    let summary = fx.api.reconcile_stale_payments(Duration::zero()).await.unwrap();
    assert_eq!(summary.checked, 0);
    fx.tear_down().await;
}
