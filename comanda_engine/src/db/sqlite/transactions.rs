use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewTransaction, Pagination, Transaction, TransactionState},
    traits::{ChargeDetails, InsertTransactionResult},
};

const TX_COLUMNS: &str = "id, user_id, order_id, external_id, charge_id, amount, currency, state, \
                          payment_method_type, card_last4, description, error_message, created_at, updated_at, \
                          confirmed_at, failed_at, refunded_at";

/// Inserts a new pending transaction. If a transaction for the same payment intent already exists, it is returned
/// unchanged instead.
pub async fn idempotent_insert(
    tx: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<InsertTransactionResult, SqliteDatabaseError> {
    if let Some(existing) = fetch_transaction(&tx.external_id, &mut *conn).await? {
        debug!("🗃️ Transaction for {} already exists with id {}", existing.external_id, existing.id);
        return Ok(InsertTransactionResult::AlreadyExists(existing));
    }
    let external_id = tx.external_id.clone();
    match insert_transaction(tx, &mut *conn).await {
        Ok(inserted) => Ok(InsertTransactionResult::Inserted(inserted)),
        Err(e) if e.is_unique_violation() => {
            let existing = fetch_transaction(&external_id, conn)
                .await?
                .ok_or_else(|| SqliteDatabaseError::QueryError(format!("Transaction {external_id} vanished")))?;
            Ok(InsertTransactionResult::AlreadyExists(existing))
        },
        Err(e) => Err(e),
    }
}

async fn insert_transaction(tx: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, SqliteDatabaseError> {
    let record = sqlx::query_as::<_, Transaction>(&format!(
        "INSERT INTO transactions (user_id, order_id, external_id, amount, currency, state, description) VALUES ($1, \
         $2, $3, $4, $5, $6, $7) RETURNING {TX_COLUMNS}"
    ))
    .bind(tx.user_id)
    .bind(tx.order_id)
    .bind(tx.external_id)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(TransactionState::Pending)
    .bind(tx.description)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Transaction #{} inserted for payment intent {}", record.id, record.external_id);
    Ok(record)
}

/// Fetches the transaction and takes the database write lock in the same statement, so that no other unit of work
/// can change it until the current one commits.
pub async fn lock_transaction(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SqliteDatabaseError> {
    let record = sqlx::query_as::<_, Transaction>(&format!(
        "UPDATE transactions SET updated_at = updated_at WHERE external_id = $1 RETURNING {TX_COLUMNS}"
    ))
    .bind(external_id)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

/// Marks a succeeded transaction as having a refund in flight. Claims made at or before `stale_before` are treated
/// as abandoned. Returns `None` if the transaction is not succeeded or another refund holds the claim.
pub async fn claim_refund(
    external_id: &str,
    stale_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SqliteDatabaseError> {
    let cutoff = stale_before.format("%Y-%m-%d %H:%M:%S").to_string();
    let record = sqlx::query_as::<_, Transaction>(&format!(
        "UPDATE transactions SET refund_claimed_at = CURRENT_TIMESTAMP WHERE external_id = $1 AND state = \
         'succeeded' AND (refund_claimed_at IS NULL OR refund_claimed_at <= $2) RETURNING {TX_COLUMNS}"
    ))
    .bind(external_id)
    .bind(cutoff)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

pub async fn release_refund(external_id: &str, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE transactions SET refund_claimed_at = NULL WHERE external_id = $1")
        .bind(external_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_transaction(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SqliteDatabaseError> {
    let record = sqlx::query_as::<_, Transaction>(&format!("SELECT {TX_COLUMNS} FROM transactions WHERE external_id = $1"))
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

pub async fn fetch_transaction_by_charge_id(
    charge_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SqliteDatabaseError> {
    let record = sqlx::query_as::<_, Transaction>(&format!("SELECT {TX_COLUMNS} FROM transactions WHERE charge_id = $1"))
        .bind(charge_id)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

/// Writes a new state onto the transaction, along with whatever the gateway told us about the charge. The timestamp
/// that belongs to the new state is set. Fields that are `None` keep their stored values.
pub async fn update_settlement(
    id: i64,
    state: TransactionState,
    charge: Option<&ChargeDetails>,
    error_message: Option<&str>,
    description: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Transaction, SqliteDatabaseError> {
    let record = sqlx::query_as::<_, Transaction>(&format!(
        "UPDATE transactions SET state = $1, charge_id = COALESCE($2, charge_id), payment_method_type = COALESCE($3, \
         payment_method_type), card_last4 = COALESCE($4, card_last4), error_message = COALESCE($5, error_message), \
         description = COALESCE($6, description), confirmed_at = CASE WHEN $1 = 'succeeded' THEN CURRENT_TIMESTAMP \
         ELSE confirmed_at END, failed_at = CASE WHEN $1 = 'failed' THEN CURRENT_TIMESTAMP ELSE failed_at END, \
         refunded_at = CASE WHEN $1 = 'refunded' THEN CURRENT_TIMESTAMP ELSE refunded_at END, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $7 RETURNING {TX_COLUMNS}"
    ))
    .bind(state)
    .bind(charge.map(|c| c.id.clone()))
    .bind(charge.and_then(|c| c.payment_method_type.clone()))
    .bind(charge.and_then(|c| c.last4.clone()))
    .bind(error_message)
    .bind(description)
    .bind(id)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Transaction #{id} is now {}", record.state);
    Ok(record)
}

pub async fn link_order(id: i64, order_id: i64, conn: &mut SqliteConnection) -> Result<Transaction, SqliteDatabaseError> {
    let record = sqlx::query_as::<_, Transaction>(&format!(
        "UPDATE transactions SET order_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING {TX_COLUMNS}"
    ))
    .bind(order_id)
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

/// The user's transactions, newest first.
pub async fn fetch_transactions_for_user(
    user_id: i64,
    page: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, SqliteDatabaseError> {
    let records = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(conn)
    .await?;
    Ok(records)
}

pub async fn count_transactions_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Count and sum of the succeeded transactions confirmed between `start` and `end`, both days inclusive.
pub async fn revenue_totals(
    start: NaiveDate,
    end: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<(i64, i64), SqliteDatabaseError> {
    let totals = sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM transactions WHERE state = 'succeeded' AND \
         date(confirmed_at) BETWEEN $1 AND $2",
    )
    .bind(start)
    .bind(end)
    .fetch_one(conn)
    .await?;
    Ok(totals)
}

/// Transactions still waiting on the customer or the gateway that were opened before the cutoff, oldest first.
pub async fn fetch_stale_transactions(
    created_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, SqliteDatabaseError> {
    let cutoff = created_before.format("%Y-%m-%d %H:%M:%S").to_string();
    let records = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions WHERE state IN ('pending', 'requires_action') AND created_at <= $1 \
         ORDER BY created_at, id"
    ))
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(records)
}

pub async fn delete_transactions_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM transactions WHERE order_id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}
