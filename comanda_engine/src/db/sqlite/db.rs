use std::fmt::Debug;

use chrono::{DateTime, NaiveDate, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::{catalog, db_url, loyalty, new_pool, orders, transactions, users, SqliteDatabaseError};
use crate::{
    api::errors::OrderFlowError,
    config::OrderFlowConfig,
    db_types::{
        LedgerAudit,
        LoyaltyLogEntry,
        LoyaltyLogKind,
        Money,
        NewLoyaltyLogEntry,
        NewOrderItem,
        NewTransaction,
        Order,
        OrderDetails,
        OrderQueryFilter,
        OrderStatusType,
        Pagination,
        PaymentMethod,
        RevenueStats,
        Role,
        Transaction,
        TransactionPage,
        TransactionState,
        UserAccount,
    },
    helpers::{check_order_payable, check_paid_amount, plan_settlement, price_order, validate_items},
    traits::{
        AccountApiError,
        AccountManagement,
        DeletedOrder,
        InsertTransactionResult,
        LoyaltyManagement,
        OrderFlowDatabase,
        PointsMovement,
        SettlementOutcome,
        SettlementUpdate,
        StateChange,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the URL in `COMANDA_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SqliteDatabaseError::MigrationError(e.to_string()))?;
        debug!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderFlowDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(
        &self,
        user_id: i64,
        items: &[NewOrderItem],
        config: &OrderFlowConfig,
    ) -> Result<OrderDetails, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = insert_priced_order(user_id, items, OrderStatusType::Pending, PaymentMethod::Cash, None, config, &mut tx)
            .await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order #{} for user #{user_id} saved. Total {}, {} points awarded",
            order.order.id, order.order.total_price, order.order.points_awarded
        );
        Ok(order)
    }

    async fn insert_pending_transaction(
        &self,
        transaction: NewTransaction,
        config: &OrderFlowConfig,
    ) -> Result<InsertTransactionResult, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        users::lock_user(transaction.user_id, &mut tx).await?.ok_or(OrderFlowError::UserNotFound(transaction.user_id))?;
        if let Some(order_id) = transaction.order_id {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
            check_order_payable(&order, transaction.user_id, transaction.amount, config.amount_tolerance)?;
        }
        let result = transactions::idempotent_insert(transaction, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn apply_settlement(
        &self,
        update: SettlementUpdate,
        config: &OrderFlowConfig,
    ) -> Result<SettlementOutcome, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let current = transactions::lock_transaction(&update.external_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::TransactionNotFound(update.external_id.clone()))?;
        let plan = plan_settlement(&current, &update);
        let record = match plan.change {
            StateChange::Applied => {
                let record = transactions::update_settlement(
                    current.id,
                    update.state,
                    update.charge.as_ref(),
                    update.error_message.as_deref(),
                    plan.description.as_deref(),
                    &mut tx,
                )
                .await?;
                debug!("🗃️ Payment {} moved from {} to {}", record.external_id, current.state, record.state);
                record
            },
            StateChange::AlreadyApplied => {
                trace!("🗃️ Payment {} is already {}. Nothing to do", current.external_id, current.state);
                current
            },
            StateChange::Ignored => {
                warn!(
                    "🗃️ Payment {} is {}. Ignoring the report that it is {}",
                    current.external_id, current.state, update.state
                );
                current
            },
        };
        let (record, order_created, order_advanced) = if plan.materialize_order {
            materialize_order(record, &update, config, &mut tx).await?
        } else {
            (record, false, false)
        };
        let mut order_cancelled = false;
        if plan.cancel_order {
            if let Some(order_id) = record.order_id {
                order_cancelled = orders::cancel_order(order_id, &mut tx).await?.is_some();
                if order_cancelled {
                    debug!("🗃️ Order #{order_id} cancelled after payment {} was refunded", record.external_id);
                }
            }
        }
        let order = match record.order_id {
            Some(order_id) => orders::fetch_order_details(order_id, &mut tx).await?,
            None => None,
        };
        tx.commit().await?;
        Ok(SettlementOutcome {
            transaction: record,
            change: plan.change,
            order,
            order_created,
            order_advanced,
            order_cancelled,
        })
    }

    async fn claim_refund(
        &self,
        external_id: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<Transaction, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let claimed = transactions::claim_refund(external_id, stale_before, &mut tx).await?;
        let result = match claimed {
            Some(record) => Ok(record),
            None => {
                let current = transactions::fetch_transaction(external_id, &mut tx)
                    .await?
                    .ok_or_else(|| OrderFlowError::TransactionNotFound(external_id.to_string()))?;
                match current.state {
                    TransactionState::Succeeded | TransactionState::Refunded => {
                        Err(OrderFlowError::AlreadyRefunded(external_id.to_string()))
                    },
                    state => Err(OrderFlowError::InvalidState {
                        external_id: external_id.to_string(),
                        state,
                        action: "refund",
                    }),
                }
            },
        };
        tx.commit().await?;
        if result.is_ok() {
            trace!("🗃️ Refund claim taken on payment {external_id}");
        }
        result
    }

    async fn release_refund(&self, external_id: &str) -> Result<(), OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        transactions::release_refund(external_id, &mut conn).await?;
        trace!("🗃️ Refund claim on payment {external_id} released");
        Ok(())
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(order_id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        let invalid = || OrderFlowError::InvalidStatusTransition { order_id, from: order.status, to: status };
        if !order.status.can_transition_to(status) {
            return Err(invalid());
        }
        let updated =
            orders::transition_order_status(order_id, order.status, status, &mut tx).await?.ok_or_else(invalid)?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} moved from {} to {}", order.status, updated.status);
        Ok(updated)
    }

    async fn delete_order_cascade(&self, order_id: i64) -> Result<DeletedOrder, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(order_id, &mut tx).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        let mut points_reversed = 0;
        for (user_id, points) in loyalty::points_for_order(order_id, &mut tx).await? {
            // Points already spent elsewhere can't be taken back
            if users::try_increment_points(user_id, -points, &mut tx).await?.is_none() {
                let user = users::fetch_user(user_id, &mut tx).await?.ok_or(OrderFlowError::UserNotFound(user_id))?;
                let balance = user.points_balance;
                return Err(OrderFlowError::InsufficientPoints { user_id, balance, delta: -points });
            }
            if user_id == order.user_id {
                points_reversed += points;
            }
        }
        let ledger_entries_removed = loyalty::delete_entries_for_order(order_id, &mut tx).await?;
        let transactions_removed = transactions::delete_transactions_for_order(order_id, &mut tx).await?;
        let items_removed = orders::delete_order_items(order_id, &mut tx).await?;
        orders::delete_order(order_id, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Order #{order_id} deleted with {items_removed} items, {transactions_removed} transactions and \
             {ledger_entries_removed} ledger entries. {points_reversed} points reversed for user #{}",
            order.user_id
        );
        Ok(DeletedOrder {
            order_id,
            user_id: order.user_id,
            items_removed,
            transactions_removed,
            ledger_entries_removed,
            points_reversed,
        })
    }

    async fn fetch_transaction(&self, external_id: &str) -> Result<Option<Transaction>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let record = transactions::fetch_transaction(external_id, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_transaction_by_charge_id(&self, charge_id: &str) -> Result<Option<Transaction>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let record = transactions::fetch_transaction_by_charge_id(charge_id, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_stale_transactions(&self, created_before: DateTime<Utc>) -> Result<Vec<Transaction>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let records = transactions::fetch_stale_transactions(created_before, &mut conn).await?;
        Ok(records)
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderDetails>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_details(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<OrderDetails>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_transactions_for_user(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> Result<TransactionPage, AccountApiError> {
        let mut tx = self.pool.begin().await?;
        let transactions = transactions::fetch_transactions_for_user(user_id, page, &mut tx).await?;
        let total = transactions::count_transactions_for_user(user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(TransactionPage { transactions, total, limit: page.limit, offset: page.offset })
    }

    async fn fetch_revenue_stats(&self, start: NaiveDate, end: NaiveDate) -> Result<RevenueStats, AccountApiError> {
        if start > end {
            return Err(AccountApiError::QueryError(format!("The start date {start} is after the end date {end}")));
        }
        let mut conn = self.pool.acquire().await?;
        let (transaction_count, total) = transactions::revenue_totals(start, end, &mut conn).await?;
        let average = if transaction_count > 0 { total / transaction_count } else { 0 };
        Ok(RevenueStats {
            start_date: start,
            end_date: end,
            transaction_count,
            total_revenue: Money::from(total),
            average_transaction: Money::from(average),
        })
    }
}

impl LoyaltyManagement for SqliteDatabase {
    async fn adjust_points(&self, actor_id: i64, user_id: i64, delta: i64) -> Result<PointsMovement, OrderFlowError> {
        if delta == 0 {
            return Err(OrderFlowError::ValidationError("A points adjustment cannot be zero".into()));
        }
        let actor = {
            let mut conn = self.pool.acquire().await?;
            users::fetch_user(actor_id, &mut conn).await?.ok_or(OrderFlowError::UserNotFound(actor_id))?
        };
        if actor.role != Role::Admin {
            return Err(OrderFlowError::ActorNotAdmin(actor_id));
        }
        let entry = NewLoyaltyLogEntry {
            user_id,
            order_id: None,
            actor_id: Some(actor_id),
            kind: LoyaltyLogKind::ManualAdjustment,
            points: delta,
        };
        let mut tx = self.pool.begin().await?;
        let movement = apply_points(entry, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Admin #{actor_id} adjusted user #{user_id}'s points by {delta}. New balance: {}", movement.balance);
        Ok(movement)
    }

    async fn redeem_points(
        &self,
        user_id: i64,
        points: i64,
        order_id: Option<i64>,
    ) -> Result<PointsMovement, OrderFlowError> {
        if points <= 0 {
            return Err(OrderFlowError::ValidationError("The number of points to redeem must be positive".into()));
        }
        if let Some(order_id) = order_id {
            let mut conn = self.pool.acquire().await?;
            let order = orders::fetch_order(order_id, &mut conn).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
            if order.user_id != user_id {
                return Err(OrderFlowError::OrderMismatch(format!(
                    "Order #{order_id} does not belong to user #{user_id}"
                )));
            }
        }
        let entry =
            NewLoyaltyLogEntry { user_id, order_id, actor_id: None, kind: LoyaltyLogKind::Redemption, points: -points };
        let mut tx = self.pool.begin().await?;
        let movement = apply_points(entry, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ User #{user_id} redeemed {points} points. New balance: {}", movement.balance);
        Ok(movement)
    }

    async fn fetch_loyalty_history(&self, user_id: i64) -> Result<Vec<LoyaltyLogEntry>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let entries = loyalty::fetch_history(user_id, &mut conn).await?;
        Ok(entries)
    }

    async fn audit_ledger(&self, user_id: i64) -> Result<Option<LedgerAudit>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let audit = loyalty::audit_user(user_id, &mut conn).await?;
        Ok(audit)
    }

    async fn fetch_ledger_discrepancies(&self) -> Result<Vec<LedgerAudit>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let audits = loyalty::fetch_discrepancies(&mut conn).await?;
        Ok(audits)
    }
}

/// Prices the items against the catalog and stores the order, its line items and its points accrual.
///
/// The user's row is locked first, which also confirms that the user exists. If `paid` is given, the order total
/// must match it within the configured tolerance.
async fn insert_priced_order(
    user_id: i64,
    items: &[NewOrderItem],
    status: OrderStatusType,
    payment_method: PaymentMethod,
    paid: Option<Money>,
    config: &OrderFlowConfig,
    conn: &mut SqliteConnection,
) -> Result<OrderDetails, OrderFlowError> {
    validate_items(items)?;
    users::lock_user(user_id, conn).await?.ok_or(OrderFlowError::UserNotFound(user_id))?;
    let product_ids = items.iter().map(|i| i.product_id).collect::<Vec<_>>();
    let catalog = catalog::fetch_products(&product_ids, conn).await?;
    let priced = price_order(items, &catalog, config.reward_rate)?;
    if let Some(paid) = paid {
        check_paid_amount(paid, priced.total, config.amount_tolerance)?;
    }
    let order = orders::insert_order(user_id, &priced, status, payment_method, conn).await?;
    let items = orders::insert_order_items(order.id, &priced.lines, conn).await?;
    if priced.points > 0 {
        users::increment_points(user_id, priced.points, conn).await?;
    }
    let accrual = NewLoyaltyLogEntry {
        user_id,
        order_id: Some(order.id),
        actor_id: None,
        kind: LoyaltyLogKind::Accrual,
        points: priced.points,
    };
    loyalty::append_entry(accrual, conn).await?;
    Ok(OrderDetails { order, items })
}

/// Links a succeeded payment to its order and moves the order into preparation, creating the order from the
/// settlement's items if the payment came first. Returns the updated transaction, and whether an order was created
/// or advanced.
async fn materialize_order(
    record: Transaction,
    update: &SettlementUpdate,
    config: &OrderFlowConfig,
    conn: &mut SqliteConnection,
) -> Result<(Transaction, bool, bool), OrderFlowError> {
    match (record.order_id, update.order_id) {
        (Some(linked), Some(requested)) if linked != requested => Err(OrderFlowError::OrderMismatch(format!(
            "Payment {} is for order #{linked}, not order #{requested}",
            record.external_id
        ))),
        (Some(linked), _) => {
            let advanced = orders::mark_order_paid(linked, conn).await?.is_some();
            Ok((record, false, advanced))
        },
        (None, Some(requested)) => {
            let order =
                orders::fetch_order(requested, conn).await?.ok_or(OrderFlowError::OrderNotFound(requested))?;
            if order.user_id != record.user_id {
                return Err(OrderFlowError::OrderMismatch(format!(
                    "Order #{requested} does not belong to user #{}",
                    record.user_id
                )));
            }
            check_paid_amount(record.amount, order.total_price, config.amount_tolerance)?;
            let record = transactions::link_order(record.id, requested, conn).await?;
            let advanced = orders::mark_order_paid(requested, conn).await?.is_some();
            if !advanced {
                warn!("🗃️ Payment {} settled for order #{requested}, which is already {}", record.external_id, order.status);
            }
            Ok((record, false, advanced))
        },
        (None, None) if !update.items.is_empty() => {
            let order = insert_priced_order(
                record.user_id,
                &update.items,
                OrderStatusType::InPreparation,
                PaymentMethod::Card,
                Some(record.amount),
                config,
                conn,
            )
            .await?;
            let record = transactions::link_order(record.id, order.order.id, conn).await?;
            debug!("🗃️ Order #{} created from payment {}", order.order.id, record.external_id);
            Ok((record, true, false))
        },
        (None, None) => Ok((record, false, false)),
    }
}

/// Applies the entry's points to the user's balance and appends the entry to the ledger. The balance is never taken
/// below zero. The increment is the first write, so it also takes the database write lock.
async fn apply_points(entry: NewLoyaltyLogEntry, conn: &mut SqliteConnection) -> Result<PointsMovement, OrderFlowError> {
    let (user_id, delta) = (entry.user_id, entry.points);
    match users::try_increment_points(user_id, delta, conn).await? {
        Some(balance) => {
            let entry = loyalty::append_entry(entry, conn).await?;
            Ok(PointsMovement { entry, balance })
        },
        None => {
            let user = users::fetch_user(user_id, conn).await?.ok_or(OrderFlowError::UserNotFound(user_id))?;
            Err(OrderFlowError::InsufficientPoints { user_id, balance: user.points_balance, delta })
        },
    }
}
