//! Storage-independent business rules. Backends call these inside their units of work.
mod pricing;
mod settlement;

pub use pricing::{
    check_order_payable,
    check_paid_amount,
    points_for_total,
    price_order,
    validate_items,
    PricedLine,
    PricedOrder,
};
pub use settlement::{plan_settlement, SettlementPlan};
