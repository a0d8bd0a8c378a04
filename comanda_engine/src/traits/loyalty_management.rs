use crate::{
    api::errors::OrderFlowError,
    db_types::{LedgerAudit, LoyaltyLogEntry},
    traits::{AccountApiError, PointsMovement},
};

/// Behaviour for managing the loyalty ledger.
///
/// Every mutation appends a ledger entry and applies the same signed delta to the user's balance in one atomic unit of
/// work, using an increment expression in the store. Balances are never allowed to become negative.
#[allow(async_fn_in_trait)]
pub trait LoyaltyManagement {
    /// Applies a signed point `delta` to the target user's balance on behalf of the admin `actor_id`, and records it
    /// as a manual adjustment.
    ///
    /// Fails with `InsufficientPoints` if the resulting balance would be negative.
    async fn adjust_points(&self, actor_id: i64, user_id: i64, delta: i64) -> Result<PointsMovement, OrderFlowError>;

    /// Spends `points` from the user's balance, optionally against an order.
    async fn redeem_points(
        &self,
        user_id: i64,
        points: i64,
        order_id: Option<i64>,
    ) -> Result<PointsMovement, OrderFlowError>;

    /// The user's ledger entries, newest first.
    async fn fetch_loyalty_history(&self, user_id: i64) -> Result<Vec<LoyaltyLogEntry>, AccountApiError>;

    /// Compares the user's denormalized balance with the sum of their ledger entries.
    async fn audit_ledger(&self, user_id: i64) -> Result<Option<LedgerAudit>, AccountApiError>;

    /// Runs the ledger audit for every user and returns only the accounts whose balance and ledger disagree.
    async fn fetch_ledger_discrepancies(&self) -> Result<Vec<LedgerAudit>, AccountApiError>;
}
