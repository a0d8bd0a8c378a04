use sqlx::SqliteConnection;

use crate::{db::sqlite::SqliteDatabaseError, db_types::UserAccount};

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserAccount>, SqliteDatabaseError> {
    let user = sqlx::query_as::<_, UserAccount>(
        "SELECT id, name, email, role, points_balance, created_at, updated_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(user)
}

/// Takes the write lock on the user's row. Returns `None` if the user does not exist.
///
/// SQLite has no `SELECT .. FOR UPDATE`. A no-op update makes the surrounding transaction a writer before anything is
/// read, so it cannot interleave with other writers.
pub async fn lock_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, i64>("UPDATE users SET updated_at = updated_at WHERE id = $1 RETURNING id")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Adds `delta` to the user's points balance in place. Returns the new balance, or `None` if the user does not exist.
pub async fn increment_points(
    user_id: i64,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let balance = sqlx::query_scalar::<_, i64>(
        "UPDATE users SET points_balance = points_balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         RETURNING points_balance",
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(balance)
}

/// As [`increment_points`], but leaves the balance untouched, and returns `None`, if the result would be negative.
pub async fn try_increment_points(
    user_id: i64,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let balance = sqlx::query_scalar::<_, i64>(
        "UPDATE users SET points_balance = points_balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND \
         points_balance + $1 >= 0 RETURNING points_balance",
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(balance)
}
