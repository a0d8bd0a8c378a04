use std::collections::HashMap;

use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Order, OrderDetails, OrderItem, OrderQueryFilter, OrderStatusType, PaymentMethod},
    helpers::{PricedLine, PricedOrder},
};

const ORDER_COLUMNS: &str =
    "id, user_id, status, total_price, points_awarded, payment_method, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, notes";

pub async fn insert_order(
    user_id: i64,
    priced: &PricedOrder,
    status: OrderStatusType,
    payment_method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Order, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "INSERT INTO orders (user_id, status, total_price, points_awarded, payment_method) VALUES ($1, $2, $3, $4, $5) \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(status)
    .bind(priced.total)
    .bind(priced.points)
    .bind(payment_method)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn insert_order_items(
    order_id: i64,
    lines: &[PricedLine],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder =
        QueryBuilder::<Sqlite>::new("INSERT INTO order_items (order_id, product_id, quantity, unit_price, notes) ");
    builder.push_values(lines, |mut row, line| {
        row.push_bind(order_id)
            .push_bind(line.product_id)
            .push_bind(line.quantity)
            .push_bind(line.unit_price)
            .push_bind(line.notes.clone());
    });
    builder.push(" RETURNING ");
    builder.push(ITEM_COLUMNS);
    let mut items = builder.build_query_as::<OrderItem>().fetch_all(conn).await?;
    items.sort_by_key(|i| i.id);
    Ok(items)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Fetches the order and takes the database write lock. See [`super::users::lock_user`].
pub async fn lock_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET updated_at = updated_at WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items =
        sqlx::query_as::<_, OrderItem>(&format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"))
            .bind(order_id)
            .fetch_all(conn)
            .await?;
    Ok(items)
}

pub async fn fetch_order_details(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderDetails>, SqliteDatabaseError> {
    let Some(order) = fetch_order(order_id, &mut *conn).await? else {
        return Ok(None);
    };
    let items = fetch_order_items(order_id, conn).await?;
    Ok(Some(OrderDetails { order, items }))
}

/// Fetches orders matching the filter, newest first, with their line items.
pub async fn search_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderDetails>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
    if !query.is_empty() {
        builder.push(" WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(*status);
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    let ids = orders.iter().map(|o| o.id).collect::<Vec<_>>();
    let mut items = fetch_items_for_orders(&ids, conn).await?;
    let result = orders
        .into_iter()
        .map(|order| {
            let items = items.remove(&order.id).unwrap_or_default();
            OrderDetails { order, items }
        })
        .collect();
    Ok(result)
}

async fn fetch_items_for_orders(
    order_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<HashMap<i64, Vec<OrderItem>>, SqliteDatabaseError> {
    let mut result = HashMap::<i64, Vec<OrderItem>>::new();
    if order_ids.is_empty() {
        return Ok(result);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id IN ("));
    let mut id_list = builder.separated(", ");
    for id in order_ids {
        id_list.push_bind(*id);
    }
    id_list.push_unseparated(") ORDER BY id");
    let items = builder.build_query_as::<OrderItem>().fetch_all(conn).await?;
    for item in items {
        result.entry(item.order_id).or_default().push(item);
    }
    Ok(result)
}

/// Moves the order from `from` to `to`. Returns `None`, and changes nothing, if the order is no longer in `from`.
pub async fn transition_order_status(
    order_id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3 RETURNING \
         {ORDER_COLUMNS}"
    ))
    .bind(to)
    .bind(order_id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Moves a pending order into preparation and records that it was paid by card. Orders that have already left the
/// pending stage are not touched, in which case `None` is returned.
pub async fn mark_order_paid(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = $1, payment_method = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND status \
         = $4 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(OrderStatusType::InPreparation)
    .bind(PaymentMethod::Card)
    .bind(order_id)
    .bind(OrderStatusType::Pending)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Cancels the order. Returns `None` if it was already cancelled.
pub async fn cancel_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status <> $1 RETURNING \
         {ORDER_COLUMNS}"
    ))
    .bind(OrderStatusType::Cancelled)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn delete_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn delete_order(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}
