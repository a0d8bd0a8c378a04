//! Read-only access to the product catalog. Prices read here are frozen into order line items.
use std::collections::HashMap;

use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{db::sqlite::SqliteDatabaseError, db_types::Product};

/// Fetches a snapshot of the given products, keyed by id. Unknown ids are simply absent from the result.
pub async fn fetch_products(
    ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<HashMap<i64, Product>, SqliteDatabaseError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, name, price, available FROM products WHERE id IN (");
    let mut id_list = builder.separated(", ");
    for id in ids {
        id_list.push_bind(*id);
    }
    id_list.push_unseparated(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}
