//! Notification hooks for order and payment events.
//!
//! The engine publishes an event when a card payment settles, when a refund cancels an order, and when a payment
//! fails. These hooks turn them into log notices for kitchen and front-of-house staff. A push channel can be attached
//! here without touching the engine.
use comanda_engine::events::{EventHandlers, EventHooks, OrderAnnulledEvent, OrderPaidEvent, PaymentFailedEvent};
use log::*;

pub const NOTIFICATION_BUFFER_SIZE: usize = 25;

pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev: OrderPaidEvent| {
        Box::pin(async move {
            let OrderPaidEvent { order, transaction } = ev;
            info!(
                "📬️ Order #{} for user #{} is paid ({} via {}). Send it to the kitchen.",
                order.id, order.user_id, transaction.amount, transaction.external_id
            );
        })
    });
    hooks.on_order_annulled(|ev: OrderAnnulledEvent| {
        Box::pin(async move {
            info!("📬️ Order #{} for user #{} was annulled. Status: {}", ev.order.id, ev.order.user_id, ev.status);
        })
    });
    hooks.on_payment_failed(|ev: PaymentFailedEvent| {
        Box::pin(async move {
            let tx = ev.transaction;
            warn!(
                "📬️ Payment {} from user #{} is {}. {}",
                tx.external_id,
                tx.user_id,
                tx.state,
                tx.error_message.as_deref().unwrap_or("No reason given")
            );
        })
    });
    hooks
}

pub fn notification_handlers() -> EventHandlers {
    EventHandlers::new(NOTIFICATION_BUFFER_SIZE, notification_hooks())
}
