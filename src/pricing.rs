//! Order validation and total calculation.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{app_error::AppError, models::MenuItemEntity};

/// One requested line of an order.
#[derive(Deserialize, Debug, Clone, Copy, ToSchema)]
pub struct OrderLine {
    pub menu_item_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("Order must contain at least one item")]
    Empty,
    #[error("Quantity for item {0} must be at least 1")]
    InvalidQuantity(i32),
    #[error("Menu item {0} appears more than once")]
    DuplicateItem(i32),
    #[error("One or more menu items do not exist")]
    UnknownItem,
    #[error("Item does not belong to the specified stall")]
    WrongStall,
    #[error("Item {0} is not available")]
    Unavailable(i32),
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// A validated line with the unit price captured at order time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedLine {
    pub menu_item_id: i32,
    pub quantity: i32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total_amount: f64,
}

/// Checks that need no database access.
pub fn check_lines(lines: &[OrderLine]) -> Result<(), PricingError> {
    if lines.is_empty() {
        return Err(PricingError::Empty);
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(PricingError::InvalidQuantity(line.menu_item_id));
        }
        if !seen.insert(line.menu_item_id) {
            return Err(PricingError::DuplicateItem(line.menu_item_id));
        }
    }
    Ok(())
}

/// Validate `lines` against the menu items loaded for them and compute the
/// total. `menu` may hold the items in any order.
pub fn price_order(
    stall_id: i32,
    lines: &[OrderLine],
    menu: &[MenuItemEntity],
) -> Result<PricedOrder, PricingError> {
    check_lines(lines)?;

    let by_id: HashMap<i32, &MenuItemEntity> = menu.iter().map(|item| (item.id, item)).collect();
    if lines.iter().any(|line| !by_id.contains_key(&line.menu_item_id)) {
        return Err(PricingError::UnknownItem);
    }

    let mut priced = Vec::with_capacity(lines.len());
    let mut total_amount = 0.0;
    for line in lines {
        let item = by_id[&line.menu_item_id];
        if item.stall_id != stall_id {
            return Err(PricingError::WrongStall);
        }
        if !item.is_available {
            return Err(PricingError::Unavailable(item.id));
        }
        total_amount += item.price * f64::from(line.quantity);
        priced.push(PricedLine {
            menu_item_id: item.id,
            quantity: line.quantity,
            unit_price: item.price,
        });
    }

    Ok(PricedOrder {
        lines: priced,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::MenuCategory;

    fn item(id: i32, stall_id: i32, price: f64, is_available: bool) -> MenuItemEntity {
        MenuItemEntity {
            id,
            stall_id,
            name: format!("item {id}"),
            description: None,
            price,
            category: MenuCategory::Main,
            is_available,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn line(menu_item_id: i32, quantity: i32) -> OrderLine {
        OrderLine {
            menu_item_id,
            quantity,
        }
    }

    #[test]
    fn total_is_price_times_quantity() {
        let menu = vec![item(2, 1, 30.0, true), item(1, 1, 45.5, true)];
        let order = price_order(1, &[line(1, 2), line(2, 3)], &menu).unwrap();

        assert_eq!(order.total_amount, 181.0);
        assert_eq!(
            order.lines,
            vec![
                PricedLine {
                    menu_item_id: 1,
                    quantity: 2,
                    unit_price: 45.5
                },
                PricedLine {
                    menu_item_id: 2,
                    quantity: 3,
                    unit_price: 30.0
                },
            ]
        );
    }

    #[test]
    fn empty_orders_are_rejected() {
        assert_eq!(price_order(1, &[], &[]), Err(PricingError::Empty));
    }

    #[test]
    fn quantities_must_be_positive() {
        let menu = vec![item(1, 1, 10.0, true)];
        assert_eq!(
            price_order(1, &[line(1, 0)], &menu),
            Err(PricingError::InvalidQuantity(1))
        );
        assert_eq!(
            price_order(1, &[line(1, -2)], &menu),
            Err(PricingError::InvalidQuantity(1))
        );
    }

    #[test]
    fn repeated_items_are_rejected() {
        let menu = vec![item(1, 1, 10.0, true)];
        assert_eq!(
            price_order(1, &[line(1, 1), line(1, 2)], &menu),
            Err(PricingError::DuplicateItem(1))
        );
    }

    #[test]
    fn missing_items_are_rejected() {
        let menu = vec![item(1, 1, 10.0, true)];
        assert_eq!(
            price_order(1, &[line(1, 1), line(99, 1)], &menu),
            Err(PricingError::UnknownItem)
        );
    }

    #[test]
    fn items_must_belong_to_the_stall() {
        let menu = vec![item(1, 1, 10.0, true), item(2, 7, 10.0, true)];
        assert_eq!(
            price_order(1, &[line(1, 1), line(2, 1)], &menu),
            Err(PricingError::WrongStall)
        );
    }

    #[test]
    fn unavailable_items_are_rejected() {
        let menu = vec![item(1, 1, 10.0, false)];
        let err = price_order(1, &[line(1, 1)], &menu).unwrap_err();
        assert_eq!(err, PricingError::Unavailable(1));
        assert_eq!(err.to_string(), "Item 1 is not available");
    }
}
