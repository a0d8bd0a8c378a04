use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use comanda_engine::{
    config::OrderFlowConfig,
    db_types::{OrderStatusType, Role},
    events::EventProducers,
    test_utils::fake_gateway::FakeGateway,
    traits::DeletedOrder,
    AccountApi,
    OrderFlowApi,
    OrderFlowError,
};
use serde_json::Value;

use super::{
    helpers::{issue_token, order, send_request},
    mocks::{MockAccountManager, MockFlowBackend},
};
use crate::routes::{AllOrdersRoute, CreateOrderRoute, DeleteOrderRoute, MyOrdersRoute, UpdateOrderStatusRoute};

fn configure_accounts(cfg: &mut ServiceConfig) {
    let mut accounts = MockAccountManager::new();
    accounts.expect_search_orders().returning(|query| {
        let user_id = query.user_id.unwrap_or(3);
        let status = query.statuses.first().copied().unwrap_or(OrderStatusType::Pending);
        Ok(vec![order(1, user_id, status)])
    });
    cfg.app_data(web::Data::new(AccountApi::new(accounts)))
        .service(MyOrdersRoute::<MockAccountManager>::new())
        .service(AllOrdersRoute::<MockAccountManager>::new());
}

fn flow_api(backend: MockFlowBackend) -> web::Data<OrderFlowApi<MockFlowBackend, FakeGateway>> {
    let api = OrderFlowApi::new(backend, FakeGateway::new(), EventProducers::default(), OrderFlowConfig::default());
    web::Data::new(api)
}

#[actix_web::test]
async fn fetch_my_orders_without_a_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/orders/mine"), "", configure_accounts).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No bearer token was provided."}"#);
}

#[actix_web::test]
async fn fetch_my_orders_with_a_tampered_token() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token(7, Role::Customer);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    let (status, _) = send_request(TestRequest::get().uri("/orders/mine"), &token, configure_accounts).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let (status, body) = send_request(TestRequest::get().uri("/orders/mine"), &token, configure_accounts).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(orders[0]["user_id"], 7);
    assert_eq!(orders[0]["status"], "pendiente");
    assert_eq!(orders[0]["total_price"], 17000);
    assert_eq!(orders[0]["items"][0]["unit_price"], 8500);
}

#[actix_web::test]
async fn customers_cannot_list_all_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let (status, body) = send_request(TestRequest::get().uri("/orders"), &token, configure_accounts).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("admin, staff"), "{body}");
}

#[actix_web::test]
async fn staff_list_orders_by_status() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(2, Role::Staff);
    let req = TestRequest::get().uri("/orders?status=en_preparacion&user_id=5");
    let (status, body) = send_request(req, &token, configure_accounts).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(orders[0]["user_id"], 5);
    assert_eq!(orders[0]["status"], "en_preparacion");
}

#[actix_web::test]
async fn unknown_statuses_are_rejected() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, Role::Admin);
    let req = TestRequest::get().uri("/orders?status=shipped");
    let (status, _) = send_request(req, &token, configure_accounts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn create_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let req = TestRequest::post()
        .uri("/orders")
        .set_json(serde_json::json!({ "items": [{ "product_id": 1, "quantity": 2 }] }));
    let (status, body) = send_request(req, &token, |cfg| {
        let mut backend = MockFlowBackend::new();
        backend
            .expect_create_order()
            .withf(|user_id, items, _| *user_id == 7 && items.len() == 1 && items[0].quantity == 2)
            .times(1)
            .returning(|user_id, _, _| Ok(order(11, user_id, OrderStatusType::Pending)));
        cfg.app_data(flow_api(backend)).service(CreateOrderRoute::<MockFlowBackend, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["id"], 11);
    assert_eq!(order["points_awarded"], 17);
    assert_eq!(order["payment_method"], "efectivo");
}

#[actix_web::test]
async fn create_order_with_an_unavailable_product() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let req = TestRequest::post()
        .uri("/orders")
        .set_json(serde_json::json!({ "items": [{ "product_id": 4, "quantity": 1, "notes": "sin hielo" }] }));
    let (status, body) = send_request(req, &token, |cfg| {
        let mut backend = MockFlowBackend::new();
        backend
            .expect_create_order()
            .returning(|_, _, _| Err(OrderFlowError::ProductUnavailable(4, "Horchata".to_string())));
        cfg.app_data(flow_api(backend)).service(CreateOrderRoute::<MockFlowBackend, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Product #4 (Horchata) is not available"}"#);
}

#[actix_web::test]
async fn invalid_status_transitions_conflict() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(2, Role::Staff);
    let req = TestRequest::patch().uri("/orders/9/status").set_json(serde_json::json!({ "status": "pendiente" }));
    let (status, _) = send_request(req, &token, |cfg| {
        let mut backend = MockFlowBackend::new();
        backend.expect_update_order_status().returning(|order_id, to| {
            Err(OrderFlowError::InvalidStatusTransition { order_id, from: OrderStatusType::Delivered, to })
        });
        cfg.app_data(flow_api(backend)).service(UpdateOrderStatusRoute::<MockFlowBackend, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn staff_update_order_status() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(2, Role::Staff);
    let req = TestRequest::patch().uri("/orders/9/status").set_json(serde_json::json!({ "status": "listo" }));
    let (status, body) = send_request(req, &token, |cfg| {
        let mut backend = MockFlowBackend::new();
        backend
            .expect_update_order_status()
            .withf(|order_id, status| *order_id == 9 && *status == OrderStatusType::Ready)
            .returning(|order_id, status| Ok(order(order_id, 7, status).order));
        cfg.app_data(flow_api(backend)).service(UpdateOrderStatusRoute::<MockFlowBackend, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["status"], "listo");
}

#[actix_web::test]
async fn only_admins_delete_orders() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut backend = MockFlowBackend::new();
        backend.expect_delete_order_cascade().returning(|order_id| {
            Ok(DeletedOrder {
                order_id,
                user_id: 7,
                items_removed: 1,
                transactions_removed: 1,
                ledger_entries_removed: 1,
                points_reversed: 17,
            })
        });
        cfg.app_data(flow_api(backend)).service(DeleteOrderRoute::<MockFlowBackend, FakeGateway>::new());
    };
    let token = issue_token(2, Role::Staff);
    let (status, _) = send_request(TestRequest::delete().uri("/orders/9"), &token, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = issue_token(1, Role::Admin);
    let (status, body) = send_request(TestRequest::delete().uri("/orders/9"), &token, configure).await;
    assert_eq!(status, StatusCode::OK);
    let deleted: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(deleted["order_id"], 9);
    assert_eq!(deleted["points_reversed"], 17);
}
