use actix_web::{http::StatusCode, web::ServiceConfig};
use comanda_engine::{
    config::OrderFlowConfig,
    db_types::TransactionState,
    events::EventProducers,
    test_utils::fake_gateway::FakeGateway,
    traits::{SettlementOutcome, StateChange},
    OrderFlowApi,
    OrderFlowError,
};

use super::{
    helpers::{send_webhook, sign_payload, transaction},
    mocks::MockFlowBackend,
};
use crate::routes::StripeWebhookRoute;

const SUCCEEDED_EVENT: &str = r#"{"id":"evt_1","type":"payment_intent.succeeded","created":1717171717,"data":{"object":{
    "id":"pi_1","object":"payment_intent","amount":17000,"currency":"usd","status":"succeeded","created":1717171700,
    "latest_charge":{"id":"ch_1","object":"charge","amount":17000,
      "payment_method_details":{"type":"card","card":{"brand":"visa","last4":"4242"}}}}}}"#;

const UNKNOWN_EVENT: &str =
    r#"{"id":"evt_2","type":"customer.created","created":1717171717,"data":{"object":{"object":"customer"}}}"#;

fn configure_with(backend: MockFlowBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = OrderFlowApi::new(backend, FakeGateway::new(), EventProducers::default(), OrderFlowConfig::default());
        cfg.app_data(actix_web::web::Data::new(api)).service(StripeWebhookRoute::<MockFlowBackend, FakeGateway>::new());
    }
}

fn untouched_backend() -> MockFlowBackend {
    let mut backend = MockFlowBackend::new();
    backend.expect_apply_settlement().never();
    backend
}

#[actix_web::test]
async fn unsigned_deliveries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, _) = send_webhook(SUCCEEDED_EVENT, None, configure_with(untouched_backend())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn tampered_deliveries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let signature = sign_payload(SUCCEEDED_EVENT);
    let tampered = SUCCEEDED_EVENT.replace("17000", "1");
    let (status, _) = send_webhook(&tampered, Some(signature), configure_with(untouched_backend())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_event_types_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let signature = sign_payload(UNKNOWN_EVENT);
    let (status, body) = send_webhook(UNKNOWN_EVENT, Some(signature), configure_with(untouched_backend())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn events_for_unknown_payments_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockFlowBackend::new();
    backend
        .expect_apply_settlement()
        .times(1)
        .returning(|update, _| Err(OrderFlowError::TransactionNotFound(update.external_id)));
    let signature = sign_payload(SUCCEEDED_EVENT);
    let (status, body) = send_webhook(SUCCEEDED_EVENT, Some(signature), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn succeeded_events_are_settled() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockFlowBackend::new();
    backend
        .expect_apply_settlement()
        .withf(|update, _| {
            update.external_id == "pi_1" &&
                update.state == TransactionState::Succeeded &&
                update.charge.as_ref().and_then(|c| c.last4.as_deref()) == Some("4242")
        })
        .times(1)
        .returning(|update, _| {
            Ok(SettlementOutcome {
                transaction: transaction(1, 7, &update.external_id, update.state),
                change: StateChange::Applied,
                order: None,
                order_created: false,
                order_advanced: false,
                order_cancelled: false,
            })
        });
    let signature = sign_payload(SUCCEEDED_EVENT);
    let (status, _) = send_webhook(SUCCEEDED_EVENT, Some(signature), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn signed_garbage_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"not":"an event"}"#;
    let signature = sign_payload(payload);
    let (status, body) = send_webhook(payload, Some(signature), configure_with(untouched_backend())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid webhook event"), "{body}");
}
