use chrono::NaiveDate;
use thiserror::Error;

use crate::db_types::{OrderDetails, OrderQueryFilter, Pagination, RevenueStats, TransactionPage, UserAccount};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

/// Read-only queries over users, orders, payments and revenue.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Fetches the user account for the given id. If no account exists, `None` is returned.
    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError>;

    /// Fetches an order and its line items.
    async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderDetails>, AccountApiError>;

    /// Fetches orders, with their line items, that match the filter. Newest orders come first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<OrderDetails>, AccountApiError>;

    /// A page of the user's payment transactions, newest first, along with the user's total transaction count.
    async fn fetch_transactions_for_user(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> Result<TransactionPage, AccountApiError>;

    /// Count, sum and average of succeeded payments confirmed between `start` and `end` (both inclusive).
    async fn fetch_revenue_stats(&self, start: NaiveDate, end: NaiveDate) -> Result<RevenueStats, AccountApiError>;
}
