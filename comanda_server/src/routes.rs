//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they pull the caller's identity out of the request,
//! call one engine API method, and serialize the result. Anything longer belongs in the engine.
//!
//! A note about performance:
//! Each worker thread processes its requests sequentially, so handlers must never block the current thread. Database
//! and gateway calls are all `async`, and an awaiting handler lets the worker get on with other requests:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpResponse, Responder};
use comanda_engine::{
    db_types::{OrderQueryFilter, Pagination, Role},
    traits::{AccountManagement, LoyaltyManagement, OrderFlowDatabase, PaymentGateway},
    AccountApi,
    LoyaltyApi,
    OrderFlowApi,
};
use log::*;
use serde_json::json;
use stripe_tools::WebhookEvent;

use crate::{
    auth::JwtClaims,
    data_objects::{
        AdjustPointsRequest,
        ConfirmPaymentRequest,
        CreateIntentRequest,
        NewOrderRequest,
        OrderListQuery,
        PaginationParams,
        RedeemRequest,
        RefundPaymentRequest,
        RevenueQuery,
        StatusUpdateRequest,
    },
    errors::ServerError,
    integrations::stripe::gateway_event,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
//
// * `impl Bound, ...` routes are generic over one backend type `A` that implements every listed bound.
// * `flow` routes are generic over the order flow backend `B` and the payment gateway `G`.
// * `requires [roles]` wraps the route in an ACL that admits callers holding any one of the roles.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds+)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where requires [$($roles:path),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds+)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal flow) => {
        paste::paste! { pub struct [<$name:camel Route>]<B, G>(core::marker::PhantomData<fn() -> (B, G)>);}
        paste::paste! { impl<B, G> [<$name:camel Route>]<B, G> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (B, G)>)
            }
        }}
        paste::paste! { impl<B, G> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B, G>
        where
            B: comanda_engine::traits::OrderFlowDatabase + comanda_engine::traits::AccountManagement + 'static,
            G: comanda_engine::traits::PaymentGateway + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B, G>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal flow where requires [$($roles:path),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<B, G>(core::marker::PhantomData<fn() -> (B, G)>);}
        paste::paste! { impl<B, G> [<$name:camel Route>]<B, G> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (B, G)>)
            }
        }}
        paste::paste! { impl<B, G> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B, G>
        where
            B: comanda_engine::traits::OrderFlowDatabase + comanda_engine::traits::AccountManagement + 'static,
            G: comanda_engine::traits::PaymentGateway + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B, G>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" flow);
/// Creates a cash order for the caller at the current catalog prices. Loyalty points are awarded immediately.
pub async fn create_order<B, G>(
    claims: JwtClaims,
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let NewOrderRequest { items } = body.into_inner();
    debug!("💻️ POST create_order for user #{} with {} items", claims.id, items.len());
    let order = api.create_order(claims.id, &items).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(my_orders => Get "/orders/mine" impl AccountManagement);
pub async fn my_orders<B: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for user #{}", claims.id);
    let orders = api.orders_for_user(claims.id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(all_orders => Get "/orders" impl AccountManagement where requires [Role::Admin, Role::Staff]);
/// Lists orders, newest first. Staff can narrow the list with `?status=pendiente` and `?user_id=n`.
pub async fn all_orders<B: AccountManagement>(
    query: web::Query<OrderListQuery>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::from(query.into_inner());
    debug!("💻️ GET all_orders. Filter: {filter:?}");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(update_order_status => Patch "/orders/{id}/status" flow where requires [Role::Admin, Role::Staff]);
pub async fn update_order_status<B, G>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    let status = body.into_inner().status;
    debug!("💻️ PATCH order #{order_id} status to {status}");
    let order = api.update_order_status(order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(delete_order => Delete "/orders/{id}" flow where requires [Role::Admin]);
/// Deletes an order with its items and payments, and takes back the loyalty points it earned.
pub async fn delete_order<B, G>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    info!("💻️ DELETE order #{order_id}");
    let deleted = api.delete_order(order_id).await?;
    Ok(HttpResponse::Ok().json(deleted))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment_intent => Post "/payments/intents" flow);
/// Opens a card payment with the gateway. The response carries the client secret that the front end needs to
/// collect the card details.
pub async fn create_payment_intent<B, G>(
    claims: JwtClaims,
    body: web::Json<CreateIntentRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let CreateIntentRequest { amount, description, order_id } = body.into_inner();
    debug!("💻️ POST payment intent for user #{} for {amount}", claims.id);
    let created = api.create_payment_intent(claims.id, amount, description, order_id).await?;
    Ok(HttpResponse::Created().json(created))
}

route!(confirm_payment => Post "/payments/confirm" flow);
/// Settles the caller's payment from the gateway's current view of it. Callers can only confirm their own payments.
pub async fn confirm_payment<B, G>(
    claims: JwtClaims,
    body: web::Json<ConfirmPaymentRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let ConfirmPaymentRequest { payment_intent_id, order_id, items } = body.into_inner();
    debug!("💻️ POST confirm payment {payment_intent_id} for user #{}", claims.id);
    let result = api.confirm_payment(claims.id, &payment_intent_id, order_id, items).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(refund_payment => Post "/payments/refund" flow where requires [Role::Admin]);
pub async fn refund_payment<B, G>(
    body: web::Json<RefundPaymentRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let RefundPaymentRequest { payment_intent_id, amount } = body.into_inner();
    info!("💻️ POST refund for payment {payment_intent_id}");
    let result = api.refund_payment(&payment_intent_id, amount).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(payment_status => Get "/payments/status/{intent_id}" flow);
/// Compares the gateway's view of a payment with the local record. Customers only see their own payments. Anyone
/// else's is reported as not found.
pub async fn payment_status<B, G>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let intent_id = path.into_inner();
    debug!("💻️ GET payment status for {intent_id}");
    let report = api.check_payment_status(&intent_id).await?;
    if report.user_id != claims.id && !claims.is_admin() {
        debug!("💻️ User #{} asked for payment {intent_id}, which belongs to someone else", claims.id);
        return Err(ServerError::NoRecordFound(format!("Payment {intent_id}")));
    }
    Ok(HttpResponse::Ok().json(report))
}

route!(my_transactions => Get "/payments/transactions" impl AccountManagement);
pub async fn my_transactions<B: AccountManagement>(
    claims: JwtClaims,
    query: web::Query<PaginationParams>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let page = Pagination::from(query.into_inner());
    debug!("💻️ GET transactions for user #{}. {page:?}", claims.id);
    let transactions = api.transactions_for_user(claims.id, page).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

route!(revenue_stats => Get "/payments/revenue" impl AccountManagement where requires [Role::Admin]);
/// Succeeded card payments between `start_date` and `end_date`, both inclusive.
pub async fn revenue_stats<B: AccountManagement>(
    query: web::Query<RevenueQuery>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let RevenueQuery { start_date, end_date } = query.into_inner();
    debug!("💻️ GET revenue stats from {start_date} to {end_date}");
    let stats = api.revenue_stats(start_date, end_date).await?;
    Ok(HttpResponse::Ok().json(stats))
}

//----------------------------------------------   Loyalty  ----------------------------------------------------
route!(my_loyalty => Get "/loyalty" impl LoyaltyManagement, AccountManagement);
pub async fn my_loyalty<B>(claims: JwtClaims, api: web::Data<LoyaltyApi<B>>) -> Result<HttpResponse, ServerError>
where B: LoyaltyManagement + AccountManagement {
    debug!("💻️ GET loyalty summary for user #{}", claims.id);
    let summary =
        api.summary(claims.id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("User #{}", claims.id)))?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(redeem_points => Post "/loyalty/redeem" impl LoyaltyManagement, AccountManagement);
pub async fn redeem_points<B>(
    claims: JwtClaims,
    body: web::Json<RedeemRequest>,
    api: web::Data<LoyaltyApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: LoyaltyManagement + AccountManagement,
{
    let RedeemRequest { points, order_id } = body.into_inner();
    debug!("💻️ POST redeem {points} points for user #{}", claims.id);
    let movement = api.redeem_points(claims.id, points, order_id).await?;
    Ok(HttpResponse::Ok().json(movement))
}

route!(adjust_points => Post "/loyalty/adjust" impl LoyaltyManagement, AccountManagement where requires [Role::Admin]);
/// A manual correction to a user's points balance. The adjustment is recorded against the calling administrator.
pub async fn adjust_points<B>(
    claims: JwtClaims,
    body: web::Json<AdjustPointsRequest>,
    api: web::Data<LoyaltyApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: LoyaltyManagement + AccountManagement,
{
    let AdjustPointsRequest { user_id, delta } = body.into_inner();
    info!("💻️ POST adjust points for user #{user_id} by {delta}. Requested by #{}", claims.id);
    let movement = api.adjust_points(claims.id, user_id, delta).await?;
    Ok(HttpResponse::Ok().json(movement))
}

route!(loyalty_audit => Get "/loyalty/audit/{user_id}" impl LoyaltyManagement, AccountManagement where requires [Role::Admin]);
pub async fn loyalty_audit<B>(path: web::Path<i64>, api: web::Data<LoyaltyApi<B>>) -> Result<HttpResponse, ServerError>
where B: LoyaltyManagement + AccountManagement {
    let user_id = path.into_inner();
    debug!("💻️ GET loyalty audit for user #{user_id}");
    let audit = api.audit_user(user_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("User #{user_id}")))?;
    Ok(HttpResponse::Ok().json(json!({
        "user_id": audit.user_id,
        "balance": audit.balance,
        "ledger_sum": audit.ledger_sum,
        "consistent": audit.is_consistent(),
        "discrepancy": audit.discrepancy(),
    })))
}

route!(loyalty_discrepancies => Get "/loyalty/audit" impl LoyaltyManagement, AccountManagement where requires [Role::Admin]);
/// Every account whose points balance disagrees with its ledger. An empty list means the ledger is consistent.
pub async fn loyalty_discrepancies<B>(api: web::Data<LoyaltyApi<B>>) -> Result<HttpResponse, ServerError>
where B: LoyaltyManagement + AccountManagement {
    debug!("💻️ GET loyalty audit for all users");
    let discrepancies = api.audit_all().await?;
    Ok(HttpResponse::Ok().json(discrepancies))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(stripe_webhook => Post "/stripe" flow);
/// Receives Stripe webhook deliveries. The signature has already been checked by
/// [`crate::middleware::StripeSignatureMiddlewareFactory`] by the time the handler runs.
///
/// Event types the engine doesn't act on, and events for payments with no local record, are acknowledged with 200 so
/// that Stripe does not retry them.
pub async fn stripe_webhook<B, G>(
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase + AccountManagement,
    G: PaymentGateway,
{
    let event = serde_json::from_slice::<WebhookEvent>(&body).map_err(|e| {
        warn!("💻️ Could not deserialize Stripe webhook payload. {e}");
        ServerError::InvalidWebhookEvent(e.to_string())
    })?;
    info!("💻️ Received Stripe webhook event {} ({})", event.id, event.event_type);
    let event = gateway_event(event)?;
    match api.apply_webhook_event(event).await? {
        Some(outcome) => debug!(
            "💻️ Webhook settled payment {} as {} ({:?})",
            outcome.transaction.external_id, outcome.transaction.state, outcome.change
        ),
        None => trace!("💻️ Webhook event required no changes"),
    }
    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}
