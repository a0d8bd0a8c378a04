use chrono::{DateTime, NaiveDate, Utc};
use comanda_engine::{
    config::OrderFlowConfig,
    db_types::{
        LedgerAudit,
        LoyaltyLogEntry,
        NewOrderItem,
        NewTransaction,
        Order,
        OrderDetails,
        OrderQueryFilter,
        OrderStatusType,
        Pagination,
        RevenueStats,
        Transaction,
        TransactionPage,
        UserAccount,
    },
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
    },
    OrderFlowError,
};
use mockall::mock;

mock! {
    pub AccountManager {}
    impl AccountManagement for AccountManager {
        async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError>;
        async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderDetails>, AccountApiError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<OrderDetails>, AccountApiError>;
        async fn fetch_transactions_for_user(&self, user_id: i64, page: Pagination) -> Result<TransactionPage, AccountApiError>;
        async fn fetch_revenue_stats(&self, start: NaiveDate, end: NaiveDate) -> Result<RevenueStats, AccountApiError>;
    }
    impl LoyaltyManagement for AccountManager {
        async fn adjust_points(&self, actor_id: i64, user_id: i64, delta: i64) -> Result<PointsMovement, OrderFlowError>;
        async fn redeem_points(&self, user_id: i64, points: i64, order_id: Option<i64>) -> Result<PointsMovement, OrderFlowError>;
        async fn fetch_loyalty_history(&self, user_id: i64) -> Result<Vec<LoyaltyLogEntry>, AccountApiError>;
        async fn audit_ledger(&self, user_id: i64) -> Result<Option<LedgerAudit>, AccountApiError>;
        async fn fetch_ledger_discrepancies(&self) -> Result<Vec<LedgerAudit>, AccountApiError>;
    }
}

mock! {
    pub FlowBackend {}
    impl Clone for FlowBackend {
        fn clone(&self) -> Self;
    }
    impl OrderFlowDatabase for FlowBackend {
        fn url(&self) -> &str;
        async fn create_order(&self, user_id: i64, items: &[NewOrderItem], config: &OrderFlowConfig) -> Result<OrderDetails, OrderFlowError>;
        async fn insert_pending_transaction(&self, transaction: NewTransaction, config: &OrderFlowConfig) -> Result<InsertTransactionResult, OrderFlowError>;
        async fn apply_settlement(&self, update: SettlementUpdate, config: &OrderFlowConfig) -> Result<SettlementOutcome, OrderFlowError>;
        async fn claim_refund(&self, external_id: &str, stale_before: DateTime<Utc>) -> Result<Transaction, OrderFlowError>;
        async fn release_refund(&self, external_id: &str) -> Result<(), OrderFlowError>;
        async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderFlowError>;
        async fn delete_order_cascade(&self, order_id: i64) -> Result<DeletedOrder, OrderFlowError>;
        async fn fetch_transaction(&self, external_id: &str) -> Result<Option<Transaction>, OrderFlowError>;
        async fn fetch_transaction_by_charge_id(&self, charge_id: &str) -> Result<Option<Transaction>, OrderFlowError>;
        async fn fetch_stale_transactions(&self, created_before: DateTime<Utc>) -> Result<Vec<Transaction>, OrderFlowError>;
    }
    impl AccountManagement for FlowBackend {
        async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError>;
        async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderDetails>, AccountApiError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<OrderDetails>, AccountApiError>;
        async fn fetch_transactions_for_user(&self, user_id: i64, page: Pagination) -> Result<TransactionPage, AccountApiError>;
        async fn fetch_revenue_stats(&self, start: NaiveDate, end: NaiveDate) -> Result<RevenueStats, AccountApiError>;
    }
}
