use actix_web::{
    body::MessageBody,
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, Utc};
use comanda_common::Secret;
use comanda_engine::db_types::{
    Money,
    Order,
    OrderDetails,
    OrderItem,
    OrderStatusType,
    PaymentMethod,
    Role,
    Transaction,
    TransactionState,
    UserAccount,
};
use log::debug;
use stripe_tools::{webhook::compute_signature, SIGNATURE_HEADER};

use crate::{
    auth::{JwtClaims, TokenIssuer, TokenValidator},
    config::AuthConfig,
    middleware::{JwtMiddlewareFactory, StripeSignatureMiddlewareFactory},
};

pub const WEBHOOK_SECRET: &str = "whsec_endpoint_tests_only";

// DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("e1b0c4e2a7d94b2f8c3a5d6e7f801234endpoint-tests")
}

pub fn issue_token(user_id: i64, rol: Role) -> String {
    let claims = JwtClaims::new(user_id, rol, Duration::hours(1));
    TokenIssuer::new(&get_auth_config()).issue_token(&claims).expect("Failed to sign token")
}

/// Sends `req` through the bearer token middleware to the services added by `configure`. Errors raised by
/// middleware are rendered the same way the server renders them.
pub async fn send_request<F>(req: TestRequest, token: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = req;
    if !token.is_empty() {
        req = req.insert_header((AUTHORIZATION, format!("Bearer {token}")));
    }
    let validator = TokenValidator::new(&get_auth_config());
    let app = App::new().wrap(JwtMiddlewareFactory::new(validator)).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// Posts a webhook payload through the signature middleware. `signature` is the raw `Stripe-Signature` header.
pub async fn send_webhook<F>(payload: &str, signature: Option<String>, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = TestRequest::post().uri("/stripe").set_payload(payload.to_string());
    if let Some(signature) = signature {
        req = req.insert_header((SIGNATURE_HEADER, signature));
    }
    let verifier = StripeSignatureMiddlewareFactory::new(Secret::new(WEBHOOK_SECRET.to_string()), 300);
    let app = App::new().wrap(verifier).configure(configure);
    let service = test::init_service(app).await;
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            (res.status(), String::new())
        },
    }
}

pub fn sign_payload(payload: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let signature = compute_signature(WEBHOOK_SECRET, timestamp, payload.as_bytes()).expect("Failed to sign payload");
    format!("t={timestamp},v1={signature}")
}

//----------------------------------------------   Sample records  -------------------------------------------------
pub fn user(id: i64, role: Role, points_balance: i64) -> UserAccount {
    let now = Utc::now();
    UserAccount {
        id,
        name: format!("User {id}"),
        email: format!("user{id}@example.com"),
        role,
        points_balance,
        created_at: now,
        updated_at: now,
    }
}

pub fn order(id: i64, user_id: i64, status: OrderStatusType) -> OrderDetails {
    let now = Utc::now();
    OrderDetails {
        order: Order {
            id,
            user_id,
            status,
            total_price: Money::from(17_000),
            points_awarded: 17,
            payment_method: PaymentMethod::Cash,
            created_at: now,
            updated_at: now,
        },
        items: vec![OrderItem {
            id: id * 10,
            order_id: id,
            product_id: 1,
            quantity: 2,
            unit_price: Money::from(8_500),
            notes: String::new(),
        }],
    }
}

pub fn transaction(id: i64, user_id: i64, external_id: &str, state: TransactionState) -> Transaction {
    let now = Utc::now();
    Transaction {
        id,
        user_id,
        order_id: None,
        external_id: external_id.to_string(),
        charge_id: None,
        amount: Money::from(17_000),
        currency: "usd".to_string(),
        state,
        payment_method_type: None,
        card_last4: None,
        description: "Card payment".to_string(),
        error_message: None,
        created_at: now,
        updated_at: now,
        confirmed_at: None,
        failed_at: None,
        refunded_at: None,
    }
}
