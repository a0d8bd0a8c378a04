//! Read-only access to orders, payments and revenue.
use std::fmt::Debug;

use chrono::NaiveDate;
use log::trace;

use crate::{
    db_types::{OrderDetails, OrderQueryFilter, Pagination, RevenueStats, TransactionPage, UserAccount},
    traits::{AccountApiError, AccountManagement},
};

pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn account_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError> {
        self.db.fetch_user_account(user_id).await
    }

    pub async fn order_by_id(&self, order_id: i64) -> Result<Option<OrderDetails>, AccountApiError> {
        self.db.fetch_order(order_id).await
    }

    /// The user's own orders, newest first.
    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<OrderDetails>, AccountApiError> {
        self.db.search_orders(OrderQueryFilter::default().with_user_id(user_id)).await
    }

    /// All orders matching the filter, newest first. An empty filter returns every order.
    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<OrderDetails>, AccountApiError> {
        let orders = self.db.search_orders(query).await?;
        trace!("🗃️ Order search returned {} orders", orders.len());
        Ok(orders)
    }

    pub async fn transactions_for_user(&self, user_id: i64, page: Pagination) -> Result<TransactionPage, AccountApiError> {
        self.db.fetch_transactions_for_user(user_id, page).await
    }

    /// Revenue from succeeded payments confirmed between `start` and `end`, both inclusive.
    pub async fn revenue_stats(&self, start: NaiveDate, end: NaiveDate) -> Result<RevenueStats, AccountApiError> {
        if start > end {
            return Err(AccountApiError::QueryError(format!("The start date {start} is after the end date {end}")));
        }
        self.db.fetch_revenue_stats(start, end).await
    }
}
