use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use comanda_engine::{
    db_types::{OrderStatusType, TransactionState},
    events::{EventHandlers, EventHooks},
    traits::{GatewayEvent, GatewayEventKind},
};

mod support;

use support::setup_with_producers;

#[derive(Default)]
struct Counters {
    paid: AtomicUsize,
    paid_total: AtomicI64,
    annulled: AtomicUsize,
    failed: AtomicUsize,
}

fn hooks(counters: &Arc<Counters>) -> EventHooks {
    let mut hooks = EventHooks::default();
    let c = Arc::clone(counters);
    hooks.on_order_paid(move |ev| {
        let c = Arc::clone(&c);
        Box::pin(async move {
            c.paid.fetch_add(1, Ordering::SeqCst);
            c.paid_total.fetch_add(ev.order.total_price.value(), Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let c = Arc::clone(counters);
    hooks.on_order_annulled(move |ev| {
        let c = Arc::clone(&c);
        Box::pin(async move {
            assert_eq!(ev.status, OrderStatusType::Cancelled);
            c.annulled.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let c = Arc::clone(counters);
    hooks.on_payment_failed(move |ev| {
        let c = Arc::clone(&c);
        Box::pin(async move {
            assert_eq!(ev.transaction.state, TransactionState::Failed);
            c.failed.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

#[tokio::test]
async fn hooks_fire_once_per_state_change() {
    let counters = Arc::new(Counters::default());
    let handlers = EventHandlers::new(10, hooks(&counters));
    let fx = setup_with_producers(handlers.producers()).await;
    handlers.start_handlers().await;

    let order = fx.api.create_order(fx.customer, &fx.two_tacos()).await.unwrap();
    let intent =
        fx.api.create_payment_intent(fx.customer, order.order.total_price, None, Some(order.order.id)).await.unwrap();
    let settled = fx.gateway().succeed(&intent.payment_intent_id);
    fx.api.confirm_payment(fx.customer, &intent.payment_intent_id, None, vec![]).await.unwrap();
    let redelivery = GatewayEvent { id: "evt_1".into(), kind: GatewayEventKind::IntentSucceeded(settled) };
    fx.api.apply_webhook_event(redelivery).await.unwrap();
    fx.api.refund_payment(&intent.payment_intent_id, None).await.unwrap();

    let declined = fx.api.create_payment_intent(fx.customer, order.order.total_price, None, None).await.unwrap();
    fx.gateway().decline(&declined.payment_intent_id, "Your card was declined.");
    fx.api.confirm_payment(fx.customer, &declined.payment_intent_id, None, vec![]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(counters.paid.load(Ordering::SeqCst), 1);
    assert_eq!(counters.paid_total.load(Ordering::SeqCst), 17_000);
    assert_eq!(counters.annulled.load(Ordering::SeqCst), 1);
    assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
    fx.tear_down().await;
}
