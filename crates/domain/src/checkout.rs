//! Checkout planning.
//!
//! Pure validation and pricing: given the catalog state observed in a single
//! pass, either produce a fully priced plan or reject the whole request. The
//! plan is then committed atomically by the store; see
//! [`OrderService::checkout`](crate::orders::OrderService::checkout).

use std::collections::HashMap;

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::{error::ShopError, money::Money, product::Product};

/// One requested order line: which product, how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A validated, fully priced order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price observed during planning; frozen into the order.
    pub unit_price: Money,
    pub subtotal: Money,
}

/// The outcome of a successful planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub total: Money,
}

/// Validates a checkout request against the observed catalog state and
/// computes the frozen line subtotals and order total.
///
/// Rejects the whole request on the first violation: `EmptyOrder`,
/// `InvalidQuantity` for a zero-quantity line, `ProductUnavailable` for a
/// missing or unsellable product, `InsufficientStock` naming the offending
/// product. Duplicate product ids are merged (quantities summed) before
/// validation so the stock check sees the combined demand.
pub fn plan_checkout(
    products: &HashMap<ProductId, Product>,
    items: &[OrderLineRequest],
) -> Result<CheckoutPlan, ShopError> {
    if items.is_empty() {
        return Err(ShopError::EmptyOrder);
    }

    let mut merged: Vec<(ProductId, u32)> = Vec::new();
    for item in items {
        if item.quantity == 0 {
            return Err(ShopError::InvalidQuantity { quantity: 0 });
        }
        match merged.iter_mut().find(|(id, _)| id == &item.product_id) {
            Some((_, quantity)) => *quantity += item.quantity,
            None => merged.push((item.product_id.clone(), item.quantity)),
        }
    }

    let mut lines = Vec::with_capacity(merged.len());
    for (product_id, quantity) in merged {
        let product = products
            .get(&product_id)
            .filter(|p| p.is_sellable())
            .ok_or_else(|| ShopError::ProductUnavailable {
                product_id: product_id.clone(),
            })?;

        if quantity > product.stock {
            return Err(ShopError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        let unit_price = product.price;
        lines.push(PlannedLine {
            product_id,
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        });
    }

    let total = lines.iter().map(|line| line.subtotal).sum();
    Ok(CheckoutPlan { lines, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, i64, u32)]) -> HashMap<ProductId, Product> {
        entries
            .iter()
            .map(|&(id, price_cents, stock)| {
                (
                    ProductId::new(id),
                    Product {
                        id: ProductId::new(id),
                        name: format!("Cookie {id}"),
                        price: Money::from_cents(price_cents),
                        stock,
                        active: true,
                    },
                )
            })
            .collect()
    }

    fn request(id: &str, quantity: u32) -> OrderLineRequest {
        OrderLineRequest {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn plans_subtotals_and_total() {
        let products = catalog(&[("CHOC", 1000, 5), ("OAT", 500, 10)]);
        let plan = plan_checkout(&products, &[request("CHOC", 3), request("OAT", 2)]).unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].subtotal, Money::from_cents(3000));
        assert_eq!(plan.lines[1].subtotal, Money::from_cents(1000));
        assert_eq!(plan.total, Money::from_cents(4000));
    }

    #[test]
    fn empty_request_is_rejected() {
        let products = catalog(&[("CHOC", 1000, 5)]);
        assert!(matches!(
            plan_checkout(&products, &[]),
            Err(ShopError::EmptyOrder)
        ));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let products = catalog(&[("CHOC", 1000, 5)]);
        assert!(matches!(
            plan_checkout(&products, &[request("CHOC", 0)]),
            Err(ShopError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn missing_product_rejects_whole_request() {
        let products = catalog(&[("CHOC", 1000, 5)]);
        let result = plan_checkout(&products, &[request("CHOC", 1), request("NOPE", 1)]);
        assert!(matches!(
            result,
            Err(ShopError::ProductUnavailable { product_id }) if product_id == ProductId::new("NOPE")
        ));
    }

    #[test]
    fn inactive_product_is_unavailable() {
        let mut products = catalog(&[("CHOC", 1000, 5)]);
        products.get_mut(&ProductId::new("CHOC")).unwrap().active = false;

        assert!(matches!(
            plan_checkout(&products, &[request("CHOC", 1)]),
            Err(ShopError::ProductUnavailable { .. })
        ));
    }

    #[test]
    fn insufficient_stock_names_the_offending_product() {
        let products = catalog(&[("CHOC", 1000, 5), ("OAT", 500, 2)]);
        let result = plan_checkout(&products, &[request("CHOC", 2), request("OAT", 3)]);

        assert!(matches!(
            result,
            Err(ShopError::InsufficientStock {
                product_id,
                requested: 3,
                available: 2,
            }) if product_id == ProductId::new("OAT")
        ));
    }

    #[test]
    fn duplicate_lines_are_merged_before_the_stock_check() {
        let products = catalog(&[("CHOC", 1000, 5)]);

        let plan = plan_checkout(&products, &[request("CHOC", 2), request("CHOC", 3)]).unwrap();
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].quantity, 5);
        assert_eq!(plan.total, Money::from_cents(5000));

        let result = plan_checkout(&products, &[request("CHOC", 3), request("CHOC", 3)]);
        assert!(matches!(
            result,
            Err(ShopError::InsufficientStock { requested: 6, .. })
        ));
    }

}
