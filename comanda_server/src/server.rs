use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use comanda_engine::{events::EventProducers, AccountApi, LoyaltyApi, OrderFlowApi, SqliteDatabase};
use log::*;

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    hooks::notification_handlers,
    integrations::stripe::StripeGateway,
    middleware::{JwtMiddlewareFactory, StripeSignatureMiddlewareFactory},
    reconcile_worker::start_reconcile_worker,
    routes::{
        health,
        AdjustPointsRoute,
        AllOrdersRoute,
        ConfirmPaymentRoute,
        CreateOrderRoute,
        CreatePaymentIntentRoute,
        DeleteOrderRoute,
        LoyaltyAuditRoute,
        LoyaltyDiscrepanciesRoute,
        MyLoyaltyRoute,
        MyOrdersRoute,
        MyTransactionsRoute,
        PaymentStatusRoute,
        RedeemPointsRoute,
        RefundPaymentRoute,
        RevenueStatsRoute,
        StripeWebhookRoute,
        UpdateOrderStatusRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = StripeGateway::new(config.stripe.clone())?;
    if config.stripe.webhook_secret.is_empty() {
        error!("🚨️ COMANDA_STRIPE_WEBHOOK_SECRET is not set. Every Stripe webhook delivery will be rejected.");
    }
    let handlers = notification_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.disable_reconcile_worker {
        info!("🕰️ The payment reconciliation worker is disabled");
    } else {
        let api = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone(), config.order_flow.clone());
        let loyalty = LoyaltyApi::new(db.clone());
        let _worker = start_reconcile_worker(api, loyalty, config.reconcile_interval, config.stale_payment_age);
    }
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: StripeGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let orders_api =
            OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone(), config.order_flow.clone());
        let accounts_api = AccountApi::new(db.clone());
        let loyalty_api = LoyaltyApi::new(db.clone());
        let validator = TokenValidator::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("comanda::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(loyalty_api));
        // Routes that require a bearer token
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(validator))
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(AllOrdersRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase, StripeGateway>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase, StripeGateway>::new())
            .service(DeleteOrderRoute::<SqliteDatabase, StripeGateway>::new())
            .service(CreatePaymentIntentRoute::<SqliteDatabase, StripeGateway>::new())
            .service(ConfirmPaymentRoute::<SqliteDatabase, StripeGateway>::new())
            .service(RefundPaymentRoute::<SqliteDatabase, StripeGateway>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, StripeGateway>::new())
            .service(MyTransactionsRoute::<SqliteDatabase>::new())
            .service(RevenueStatsRoute::<SqliteDatabase>::new())
            .service(MyLoyaltyRoute::<SqliteDatabase>::new())
            .service(RedeemPointsRoute::<SqliteDatabase>::new())
            .service(AdjustPointsRoute::<SqliteDatabase>::new())
            .service(LoyaltyDiscrepanciesRoute::<SqliteDatabase>::new())
            .service(LoyaltyAuditRoute::<SqliteDatabase>::new());
        let webhook_scope = web::scope("/webhooks")
            .wrap(StripeSignatureMiddlewareFactory::new(
                config.stripe.webhook_secret.clone(),
                config.stripe.webhook_tolerance,
            ))
            .service(StripeWebhookRoute::<SqliteDatabase, StripeGateway>::new());
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
