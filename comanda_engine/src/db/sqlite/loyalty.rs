use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{LedgerAudit, LoyaltyLogEntry, NewLoyaltyLogEntry},
};

const ENTRY_COLUMNS: &str = "id, user_id, order_id, actor_id, kind, points, created_at";
const AUDIT_QUERY: &str = "SELECT u.id AS user_id, u.points_balance AS balance, COALESCE((SELECT SUM(l.points) FROM \
                           loyalty_log l WHERE l.user_id = u.id), 0) AS ledger_sum FROM users u";

pub async fn append_entry(
    entry: NewLoyaltyLogEntry,
    conn: &mut SqliteConnection,
) -> Result<LoyaltyLogEntry, SqliteDatabaseError> {
    let entry = sqlx::query_as::<_, LoyaltyLogEntry>(&format!(
        "INSERT INTO loyalty_log (user_id, order_id, actor_id, kind, points) VALUES ($1, $2, $3, $4, $5) RETURNING \
         {ENTRY_COLUMNS}"
    ))
    .bind(entry.user_id)
    .bind(entry.order_id)
    .bind(entry.actor_id)
    .bind(entry.kind)
    .bind(entry.points)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Ledger entry #{} recorded: {} {} points for user #{}", entry.id, entry.kind, entry.points, entry.user_id);
    Ok(entry)
}

/// The user's ledger, newest first.
pub async fn fetch_history(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LoyaltyLogEntry>, SqliteDatabaseError> {
    let entries = sqlx::query_as::<_, LoyaltyLogEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM loyalty_log WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// Net points recorded against the order, per user.
pub async fn points_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<(i64, i64)>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        "SELECT user_id, SUM(points) FROM loyalty_log WHERE order_id = $1 GROUP BY user_id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn delete_entries_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM loyalty_log WHERE order_id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn audit_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<LedgerAudit>, SqliteDatabaseError> {
    let audit = sqlx::query_as::<_, LedgerAudit>(&format!("{AUDIT_QUERY} WHERE u.id = $1"))
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(audit)
}

/// Every user whose balance differs from the sum of their ledger entries.
pub async fn fetch_discrepancies(conn: &mut SqliteConnection) -> Result<Vec<LedgerAudit>, SqliteDatabaseError> {
    let audits = sqlx::query_as::<_, LedgerAudit>(&format!(
        "SELECT user_id, balance, ledger_sum FROM ({AUDIT_QUERY}) WHERE balance <> ledger_sum ORDER BY user_id"
    ))
    .fetch_all(conn)
    .await?;
    Ok(audits)
}
