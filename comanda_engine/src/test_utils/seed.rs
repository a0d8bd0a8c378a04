//! Rows that the CRUD side of the platform would normally own.
use crate::{
    db_types::{Money, Role},
    SqliteDatabase,
};

pub async fn seed_user(db: &SqliteDatabase, name: &str, role: Role) -> i64 {
    let email = format!("{}@comanda.test", name.to_lowercase().replace(' ', "."));
    sqlx::query_scalar::<_, i64>("INSERT INTO users (name, email, role) VALUES ($1, $2, $3) RETURNING id")
        .bind(name)
        .bind(email)
        .bind(role)
        .fetch_one(db.pool())
        .await
        .expect("Error seeding user")
}

pub async fn seed_product(db: &SqliteDatabase, name: &str, price: Money, available: bool) -> i64 {
    sqlx::query_scalar::<_, i64>("INSERT INTO products (name, price, available) VALUES ($1, $2, $3) RETURNING id")
        .bind(name)
        .bind(price)
        .bind(available)
        .fetch_one(db.pool())
        .await
        .expect("Error seeding product")
}

pub async fn set_product_price(db: &SqliteDatabase, product_id: i64, price: Money) {
    sqlx::query("UPDATE products SET price = $1 WHERE id = $2")
        .bind(price)
        .bind(product_id)
        .execute(db.pool())
        .await
        .expect("Error updating product price");
}

/// Overwrites a balance without touching the ledger, to simulate drift.
pub async fn force_points_balance(db: &SqliteDatabase, user_id: i64, balance: i64) {
    sqlx::query("UPDATE users SET points_balance = $1 WHERE id = $2")
        .bind(balance)
        .bind(user_id)
        .execute(db.pool())
        .await
        .expect("Error overwriting balance");
}

/// Number of rows in `table`. Only for use with fixed table names.
pub async fn count_rows(db: &SqliteDatabase, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await
        .expect("Error counting rows")
}
