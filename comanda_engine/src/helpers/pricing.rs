use std::collections::HashMap;

use crate::{
    api::errors::OrderFlowError,
    db_types::{Money, NewOrderItem, Order, OrderStatusType, Product},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub notes: String,
}

impl PricedLine {
    /// `None` if the subtotal does not fit in a [`Money`]
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Money,
    pub points: i64,
}

/// Checks the shape of an order request before anything is read from the store.
pub fn validate_items(items: &[NewOrderItem]) -> Result<(), OrderFlowError> {
    if items.is_empty() {
        return Err(OrderFlowError::EmptyOrder);
    }
    match items.iter().find(|i| i.quantity < 1) {
        Some(item) => Err(OrderFlowError::InvalidQuantity { product_id: item.product_id, quantity: item.quantity }),
        None => Ok(()),
    }
}

/// One loyalty point for every full `reward_rate` spent.
pub fn points_for_total(total: Money, reward_rate: Money) -> i64 {
    if !reward_rate.is_positive() || !total.is_positive() {
        return 0;
    }
    total.value() / reward_rate.value()
}

/// Prices the requested lines against a catalog snapshot. Prices are frozen at the snapshot's values.
pub fn price_order(
    items: &[NewOrderItem],
    catalog: &HashMap<i64, Product>,
    reward_rate: Money,
) -> Result<PricedOrder, OrderFlowError> {
    validate_items(items)?;
    let lines = items
        .iter()
        .map(|item| {
            let product = catalog.get(&item.product_id).ok_or(OrderFlowError::ProductNotFound(item.product_id))?;
            if !product.available {
                return Err(OrderFlowError::ProductUnavailable(product.id, product.name.clone()));
            }
            Ok(PricedLine {
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.price,
                notes: item.notes.clone(),
            })
        })
        .collect::<Result<Vec<PricedLine>, OrderFlowError>>()?;
    let total = lines.iter().try_fold(Money::default(), |total, line| {
        let subtotal = line
            .subtotal()
            .ok_or(OrderFlowError::InvalidQuantity { product_id: line.product_id, quantity: line.quantity })?;
        total.checked_add(subtotal).ok_or_else(|| OrderFlowError::InvalidAmount("The order total is too large".into()))
    })?;
    let points = points_for_total(total, reward_rate);
    Ok(PricedOrder { lines, total, points })
}

/// A settled payment must cover the order total to within `tolerance`.
pub fn check_paid_amount(paid: Money, expected: Money, tolerance: Money) -> Result<(), OrderFlowError> {
    if paid.abs_diff(expected) > tolerance {
        Err(OrderFlowError::AmountMismatch { expected, paid })
    } else {
        Ok(())
    }
}

/// An order can take a card payment if it belongs to the payer, is still pending, and costs what is being paid.
pub fn check_order_payable(order: &Order, user_id: i64, amount: Money, tolerance: Money) -> Result<(), OrderFlowError> {
    if order.user_id != user_id {
        return Err(OrderFlowError::OrderMismatch(format!("Order #{} does not belong to user #{user_id}", order.id)));
    }
    if order.status != OrderStatusType::Pending {
        return Err(OrderFlowError::OrderMismatch(format!(
            "Order #{} is {} and cannot take a card payment",
            order.id, order.status
        )));
    }
    check_paid_amount(amount, order.total_price, tolerance)
}
