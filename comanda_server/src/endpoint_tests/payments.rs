use std::collections::HashMap;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use comanda_engine::{
    config::OrderFlowConfig,
    db_types::{Money, Pagination, RevenueStats, Role, TransactionPage, TransactionState},
    events::EventProducers,
    test_utils::fake_gateway::FakeGateway,
    traits::{NewPaymentIntent, PaymentGateway},
    AccountApi,
    OrderFlowApi,
    OrderFlowError,
};
use serde_json::Value;

use super::{
    helpers::{issue_token, send_request, transaction, user},
    mocks::{MockAccountManager, MockFlowBackend},
};
use crate::routes::{
    CreatePaymentIntentRoute,
    MyTransactionsRoute,
    PaymentStatusRoute,
    RefundPaymentRoute,
    RevenueStatsRoute,
};

fn flow_api(backend: MockFlowBackend, gateway: FakeGateway) -> web::Data<OrderFlowApi<MockFlowBackend, FakeGateway>> {
    web::Data::new(OrderFlowApi::new(backend, gateway, EventProducers::default(), OrderFlowConfig::default()))
}

async fn open_intent(gateway: &FakeGateway) -> String {
    let intent = NewPaymentIntent {
        amount: Money::from(17_000),
        currency: "usd".to_string(),
        description: "Card payment".to_string(),
        metadata: HashMap::new(),
    };
    gateway.create_intent(intent).await.expect("fake gateway is online").id
}

/// The payment belongs to user #7.
fn configure_status(gateway: FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let mut backend = MockFlowBackend::new();
        backend
            .expect_fetch_transaction()
            .returning(|external_id| Ok(Some(transaction(1, 7, external_id, TransactionState::Pending))));
        cfg.app_data(flow_api(backend, gateway)).service(PaymentStatusRoute::<MockFlowBackend, FakeGateway>::new());
    }
}

#[actix_web::test]
async fn payment_status_for_the_owner() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let intent_id = open_intent(&gateway).await;
    let token = issue_token(7, Role::Customer);
    let req = TestRequest::get().uri(&format!("/payments/status/{intent_id}"));
    let (status, body) = send_request(req, &token, configure_status(gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["payment_intent_id"], intent_id.as_str());
    assert_eq!(report["status"], "requires_payment_method");
    assert_eq!(report["db_status"], "pending");
    assert_eq!(report["amount"], 17000);
}

#[actix_web::test]
async fn payment_status_hides_other_users_payments() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let intent_id = open_intent(&gateway).await;
    let token = issue_token(8, Role::Customer);
    let req = TestRequest::get().uri(&format!("/payments/status/{intent_id}"));
    let (status, _) = send_request(req, &token, configure_status(gateway.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let token = issue_token(1, Role::Admin);
    let req = TestRequest::get().uri(&format!("/payments/status/{intent_id}"));
    let (status, _) = send_request(req, &token, configure_status(gateway)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn gateway_timeouts_are_reported_as_504() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    gateway.set_offline(true);
    let token = issue_token(7, Role::Customer);
    let req = TestRequest::post().uri("/payments/intents").set_json(serde_json::json!({ "amount": 17000 }));
    let (status, body) = send_request(req, &token, move |cfg| {
        let mut backend = MockFlowBackend::new();
        backend.expect_fetch_user_account().returning(|id| Ok(Some(user(id, Role::Customer, 0))));
        backend.expect_insert_pending_transaction().never();
        cfg.app_data(flow_api(backend, gateway))
            .service(CreatePaymentIntentRoute::<MockFlowBackend, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body.contains("did not respond in time"), "{body}");
}

#[actix_web::test]
async fn charges_below_the_minimum_are_rejected() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let token = issue_token(7, Role::Customer);
    let req = TestRequest::post().uri("/payments/intents").set_json(serde_json::json!({ "amount": 49 }));
    let (status, _) = send_request(req, &token, {
        let gateway = gateway.clone();
        move |cfg: &mut ServiceConfig| {
            cfg.app_data(flow_api(MockFlowBackend::new(), gateway))
                .service(CreatePaymentIntentRoute::<MockFlowBackend, FakeGateway>::new());
        }
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(gateway.calls(), 0);
}

#[actix_web::test]
async fn only_admins_refund() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let req = TestRequest::post().uri("/payments/refund").set_json(serde_json::json!({ "payment_intent_id": "pi_1" }));
    let (status, _) = send_request(req, &token, |cfg| {
        cfg.app_data(flow_api(MockFlowBackend::new(), FakeGateway::new()))
            .service(RefundPaymentRoute::<MockFlowBackend, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn refunding_twice_conflicts() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, Role::Admin);
    let req = TestRequest::post().uri("/payments/refund").set_json(serde_json::json!({ "payment_intent_id": "pi_1" }));
    let (status, body) = send_request(req, &token, |cfg| {
        let mut backend = MockFlowBackend::new();
        backend
            .expect_claim_refund()
            .returning(|external_id, _| Err(OrderFlowError::AlreadyRefunded(external_id.to_string())));
        cfg.app_data(flow_api(backend, FakeGateway::new()))
            .service(RefundPaymentRoute::<MockFlowBackend, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"Payment pi_1 has already been refunded"}"#);
}

#[actix_web::test]
async fn transactions_use_default_pagination() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let (status, body) = send_request(TestRequest::get().uri("/payments/transactions"), &token, |cfg| {
        let mut accounts = MockAccountManager::new();
        accounts
            .expect_fetch_transactions_for_user()
            .withf(|user_id, page| *user_id == 7 && *page == Pagination { limit: 50, offset: 0 })
            .returning(|user_id, page| {
                Ok(TransactionPage {
                    transactions: vec![transaction(3, user_id, "pi_3", TransactionState::Succeeded)],
                    total: 1,
                    limit: page.limit,
                    offset: page.offset,
                })
            });
        cfg.app_data(web::Data::new(AccountApi::new(accounts)))
            .service(MyTransactionsRoute::<MockAccountManager>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let page: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 50);
    assert_eq!(page["transactions"][0]["external_id"], "pi_3");
}

#[actix_web::test]
async fn revenue_is_admin_only_and_validates_the_range() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut accounts = MockAccountManager::new();
        accounts.expect_fetch_revenue_stats().returning(|start_date, end_date| {
            Ok(RevenueStats {
                start_date,
                end_date,
                transaction_count: 2,
                total_revenue: Money::from(21_500),
                average_transaction: Money::from(10_750),
            })
        });
        cfg.app_data(web::Data::new(AccountApi::new(accounts))).service(RevenueStatsRoute::<MockAccountManager>::new());
    };
    let uri = "/payments/revenue?start_date=2024-10-01&end_date=2024-10-16";
    let token = issue_token(2, Role::Staff);
    let (status, _) = send_request(TestRequest::get().uri(uri), &token, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = issue_token(1, Role::Admin);
    let (status, body) = send_request(TestRequest::get().uri(uri), &token, configure).await;
    assert_eq!(status, StatusCode::OK);
    let stats: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["transaction_count"], 2);
    assert_eq!(stats["total_revenue"], 21500);
    assert_eq!(stats["average_transaction"], 10750);
    assert_eq!(stats["start_date"], "2024-10-01");

    let uri = "/payments/revenue?start_date=2024-10-16&end_date=2024-10-01";
    let (status, body) = send_request(TestRequest::get().uri(uri), &token, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("is after the end date"), "{body}");
}
