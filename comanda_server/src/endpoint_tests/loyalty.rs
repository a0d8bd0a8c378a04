use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use comanda_engine::{
    db_types::{LedgerAudit, LoyaltyLogEntry, LoyaltyLogKind, Role},
    traits::PointsMovement,
    LoyaltyApi,
    OrderFlowError,
};
use serde_json::Value;

use super::{
    helpers::{issue_token, send_request, user},
    mocks::MockAccountManager,
};
use crate::routes::{AdjustPointsRoute, LoyaltyAuditRoute, LoyaltyDiscrepanciesRoute, MyLoyaltyRoute, RedeemPointsRoute};

fn entry(user_id: i64, kind: LoyaltyLogKind, points: i64, actor_id: Option<i64>) -> LoyaltyLogEntry {
    LoyaltyLogEntry { id: 1, user_id, order_id: None, actor_id, kind, points, created_at: Utc::now() }
}

fn configure(cfg: &mut ServiceConfig) {
    let mut db = MockAccountManager::new();
    db.expect_fetch_user_account().returning(|id| Ok((id == 7).then(|| user(id, Role::Customer, 47))));
    db.expect_fetch_loyalty_history().returning(|user_id| {
        let redemption = entry(user_id, LoyaltyLogKind::Redemption, -20, None);
        Ok(vec![redemption, entry(user_id, LoyaltyLogKind::Accrual, 67, None)])
    });
    db.expect_adjust_points().returning(|actor_id, user_id, delta| {
        if delta < -47 {
            return Err(OrderFlowError::InsufficientPoints { user_id, balance: 47, delta });
        }
        Ok(PointsMovement {
            entry: entry(user_id, LoyaltyLogKind::ManualAdjustment, delta, Some(actor_id)),
            balance: 47 + delta,
        })
    });
    db.expect_redeem_points().returning(|user_id, points, _| {
        if points > 47 {
            return Err(OrderFlowError::InsufficientPoints { user_id, balance: 47, delta: -points });
        }
        Ok(PointsMovement { entry: entry(user_id, LoyaltyLogKind::Redemption, -points, None), balance: 47 - points })
    });
    db.expect_audit_ledger().returning(|user_id| Ok(Some(LedgerAudit { user_id, balance: 60, ledger_sum: 47 })));
    db.expect_fetch_ledger_discrepancies()
        .returning(|| Ok(vec![LedgerAudit { user_id: 7, balance: 60, ledger_sum: 47 }]));
    cfg.app_data(web::Data::new(LoyaltyApi::new(db)))
        .service(MyLoyaltyRoute::<MockAccountManager>::new())
        .service(RedeemPointsRoute::<MockAccountManager>::new())
        .service(AdjustPointsRoute::<MockAccountManager>::new())
        .service(LoyaltyDiscrepanciesRoute::<MockAccountManager>::new())
        .service(LoyaltyAuditRoute::<MockAccountManager>::new());
}

#[actix_web::test]
async fn my_loyalty_summary() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let (status, body) = send_request(TestRequest::get().uri("/loyalty"), &token, configure).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["balance"], 47);
    assert_eq!(summary["history"].as_array().map(|h| h.len()), Some(2));
    assert_eq!(summary["history"][0]["points"], -20);
}

#[actix_web::test]
async fn unknown_users_have_no_loyalty_summary() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(99, Role::Customer);
    let (status, _) = send_request(TestRequest::get().uri("/loyalty"), &token, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn redeeming_more_than_the_balance_fails() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let req = TestRequest::post().uri("/loyalty/redeem").set_json(serde_json::json!({ "points": 40 }));
    let (status, body) = send_request(req, &token, configure).await;
    assert_eq!(status, StatusCode::OK);
    let movement: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(movement["balance"], 7);

    let req = TestRequest::post().uri("/loyalty/redeem").set_json(serde_json::json!({ "points": 48 }));
    let (status, _) = send_request(req, &token, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn adjustments_need_an_admin() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "user_id": 7, "delta": 50 });
    let token = issue_token(2, Role::Staff);
    let req = TestRequest::post().uri("/loyalty/adjust").set_json(&body);
    let (status, _) = send_request(req, &token, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = issue_token(1, Role::Admin);
    let req = TestRequest::post().uri("/loyalty/adjust").set_json(&body);
    let (status, body) = send_request(req, &token, configure).await;
    assert_eq!(status, StatusCode::OK);
    let movement: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(movement["balance"], 97);
    assert_eq!(movement["entry"]["actor_id"], 1);
    assert_eq!(movement["entry"]["kind"], "manual_adjustment");

    let req = TestRequest::post().uri("/loyalty/adjust").set_json(serde_json::json!({ "user_id": 7, "delta": -48 }));
    let (status, body) = send_request(req, &token, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("cannot absorb a change of -48 points"), "{body}");
}

#[actix_web::test]
async fn ledger_audit() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, Role::Customer);
    let (status, _) = send_request(TestRequest::get().uri("/loyalty/audit/7"), &token, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = issue_token(1, Role::Admin);
    let (status, body) = send_request(TestRequest::get().uri("/loyalty/audit/7"), &token, configure).await;
    assert_eq!(status, StatusCode::OK);
    let audit: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(audit["consistent"], false);
    assert_eq!(audit["discrepancy"], 13);

    let (status, body) = send_request(TestRequest::get().uri("/loyalty/audit"), &token, configure).await;
    assert_eq!(status, StatusCode::OK);
    let drift: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(drift[0]["user_id"], 7);
}
