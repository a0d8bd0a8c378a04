use chrono::Duration;
use comanda_engine::{LoyaltyApi, OrderFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::stripe::StripeGateway;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, payments that have been waiting on the gateway for longer than `stale_age` are re-polled and
/// settled, and the loyalty ledger is audited against each user's balance. Discrepancies are reported but never
/// corrected automatically.
pub fn start_reconcile_worker(
    api: OrderFlowApi<SqliteDatabase, StripeGateway>,
    loyalty: LoyaltyApi<SqliteDatabase>,
    interval: std::time::Duration,
    stale_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Payment reconciliation worker started");
        loop {
            timer.tick().await;
            info!("🕰️ Running payment reconciliation job");
            match api.reconcile_stale_payments(stale_age).await {
                Ok(summary) => info!(
                    "🕰️ {} stale payments checked. {} updated, {} could not be reconciled",
                    summary.checked, summary.updated, summary.failed
                ),
                Err(e) => error!("🕰️ Error running payment reconciliation job: {e}"),
            }
            match loyalty.audit_all().await {
                Ok(drift) if drift.is_empty() => debug!("🕰️ Loyalty ledger is consistent"),
                Ok(drift) => warn!("🕰️ {} loyalty balances disagree with their ledger", drift.len()),
                Err(e) => error!("🕰️ Error auditing the loyalty ledger: {e}"),
            }
        }
    })
}
