use crate::{
    db_types::{Transaction, TransactionState},
    traits::{SettlementUpdate, StateChange},
};

/// The writes that the settlement applier must make for one reported state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub change: StateChange,
    /// The payment is settled, so the order it pays for must exist and be in preparation
    pub materialize_order: bool,
    /// The payment was refunded, so the linked order must be cancelled
    pub cancel_order: bool,
    /// Replacement transaction description, when the change annotates it
    pub description: Option<String>,
}

impl SettlementPlan {
    fn ignored() -> Self {
        Self { change: StateChange::Ignored, materialize_order: false, cancel_order: false, description: None }
    }
}

/// Decides what a reported state means for a transaction, given its current (locked) record.
///
/// Re-reporting the current state is a no-op for the transaction. A repeated `succeeded` still asks for order
/// materialization, which is idempotent, so that a confirmation carrying line items can create the order after the
/// webhook got there first.
pub fn plan_settlement(current: &Transaction, update: &SettlementUpdate) -> SettlementPlan {
    use TransactionState::*;
    let next = update.state;
    if current.state == next {
        return SettlementPlan {
            change: StateChange::AlreadyApplied,
            materialize_order: next == Succeeded,
            cancel_order: false,
            description: None,
        };
    }
    if !current.state.can_transition_to(next) {
        return SettlementPlan::ignored();
    }
    let description = match next {
        Canceled => Some(format!("{} - Canceled", current.description)),
        Refunded => {
            let amount = update.refunded_amount.unwrap_or(current.amount);
            Some(format!("{} - Refunded: {amount}", current.description))
        },
        _ => None,
    };
    SettlementPlan {
        change: StateChange::Applied,
        materialize_order: next == Succeeded,
        cancel_order: next == Refunded,
        description,
    }
}
