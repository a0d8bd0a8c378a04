use std::fmt::Debug;

use log::*;

use crate::{
    api::{errors::OrderFlowError, payment_objects::LoyaltySummary},
    db_types::LedgerAudit,
    traits::{AccountApiError, AccountManagement, LoyaltyManagement, PointsMovement},
};

/// Loyalty points: balances, redemptions, manual adjustments and the ledger audit.
pub struct LoyaltyApi<B> {
    db: B,
}

impl<B: Debug> Debug for LoyaltyApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoyaltyApi ({:?})", self.db)
    }
}

impl<B> LoyaltyApi<B>
where B: LoyaltyManagement + AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// An administrator's signed correction to a user's balance.
    pub async fn adjust_points(&self, admin_id: i64, user_id: i64, delta: i64) -> Result<PointsMovement, OrderFlowError> {
        self.db.adjust_points(admin_id, user_id, delta).await
    }

    pub async fn redeem_points(
        &self,
        user_id: i64,
        points: i64,
        order_id: Option<i64>,
    ) -> Result<PointsMovement, OrderFlowError> {
        self.db.redeem_points(user_id, points, order_id).await
    }

    /// The user's balance and ledger. Returns `None` for unknown users.
    pub async fn summary(&self, user_id: i64) -> Result<Option<LoyaltySummary>, AccountApiError> {
        let Some(user) = self.db.fetch_user_account(user_id).await? else {
            return Ok(None);
        };
        let history = self.db.fetch_loyalty_history(user_id).await?;
        Ok(Some(LoyaltySummary { user_id, balance: user.points_balance, history }))
    }

    pub async fn audit_user(&self, user_id: i64) -> Result<Option<LedgerAudit>, AccountApiError> {
        let audit = self.db.audit_ledger(user_id).await?;
        if let Some(audit) = audit.as_ref().filter(|a| !a.is_consistent()) {
            error!(
                "🔄️🏅️ User #{user_id} has a balance of {} points, but their ledger sums to {}",
                audit.balance, audit.ledger_sum
            );
        }
        Ok(audit)
    }

    /// Audits every user. Returns, and logs, the accounts whose balance disagrees with their ledger.
    pub async fn audit_all(&self) -> Result<Vec<LedgerAudit>, AccountApiError> {
        let discrepancies = self.db.fetch_ledger_discrepancies().await?;
        for audit in &discrepancies {
            error!(
                "🔄️🏅️ User #{} has a balance of {} points, but their ledger sums to {} (off by {})",
                audit.user_id,
                audit.balance,
                audit.ledger_sum,
                audit.discrepancy()
            );
        }
        if discrepancies.is_empty() {
            debug!("🔄️🏅️ Loyalty ledger audit passed");
        }
        Ok(discrepancies)
    }
}
