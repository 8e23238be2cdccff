//! Read-side queries shared by the student and admin order routes.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use diesel::{
    ExpressionMethods, NullableExpressionMethods, OptionalExtension, QueryDsl, Queryable,
    Selectable, SelectableHelper,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{OrderEntity, OrderItemEntity},
    schema::{food_stalls, menu_items, order_items, users},
};

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct StallSummary {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct OrderItemDetails {
    pub menu_item_id: i32,
    pub quantity: i32,
    pub price_at_order: f64,
    /// `None` once the menu item has been deleted.
    pub name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub telegram_id: Option<i64>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderDetails {
    pub order: OrderEntity,
    pub stall: Option<StallSummary>,
    pub items: Vec<OrderItemDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CustomerSummary>,
}

/// Attach stall, items and (optionally) the ordering user to each order,
/// keeping the input order. Runs a fixed number of queries regardless of how
/// many orders are passed in.
pub async fn load_order_details(
    conn: &mut AsyncPgConnection,
    orders: Vec<OrderEntity>,
    with_user: bool,
) -> Result<Vec<OrderDetails>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let stall_ids: Vec<i32> = orders
        .iter()
        .map(|order| order.stall_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let item_rows: Vec<(OrderItemEntity, Option<String>, Option<String>)> = order_items::table
        .left_join(menu_items::table)
        .filter(order_items::order_id.eq_any(&order_ids))
        .select((
            OrderItemEntity::as_select(),
            menu_items::name.nullable(),
            menu_items::image_url.nullable(),
        ))
        .order_by((order_items::order_id, order_items::menu_item_id))
        .load(conn)
        .await
        .context("Failed to get order items")?;

    let mut items: HashMap<i32, Vec<OrderItemDetails>> = HashMap::new();
    for (item, name, image_url) in item_rows {
        items.entry(item.order_id).or_default().push(OrderItemDetails {
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            price_at_order: item.price_at_order,
            name,
            image_url,
        });
    }

    let stall_rows: Vec<(i32, String)> = food_stalls::table
        .filter(food_stalls::id.eq_any(&stall_ids))
        .select((food_stalls::id, food_stalls::name))
        .load(conn)
        .await
        .context("Failed to get stalls")?;
    let stalls: HashMap<i32, StallSummary> = stall_rows
        .into_iter()
        .map(|(id, name)| (id, StallSummary { id, name }))
        .collect();

    let mut customers: HashMap<Uuid, CustomerSummary> = HashMap::new();
    if with_user {
        let user_ids: Vec<Uuid> = orders
            .iter()
            .map(|order| order.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let customer_rows: Vec<CustomerSummary> = users::table
            .filter(users::id.eq_any(&user_ids))
            .select(CustomerSummary::as_select())
            .load(conn)
            .await
            .context("Failed to get order users")?;
        customers = customer_rows
            .into_iter()
            .map(|customer| (customer.id, customer))
            .collect();
    }

    let details = orders
        .into_iter()
        .map(|order| OrderDetails {
            stall: stalls.get(&order.stall_id).cloned(),
            items: items.remove(&order.id).unwrap_or_default(),
            user: customers.get(&order.user_id).cloned(),
            order,
        })
        .collect();

    Ok(details)
}

/// Chat id of a user, if they linked Telegram.
pub async fn user_telegram_id(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<Option<i64>> {
    let telegram_id: Option<Option<i64>> = users::table
        .find(user_id)
        .select(users::telegram_id)
        .first(conn)
        .await
        .optional()
        .context("Failed to get user telegram id")?;

    Ok(telegram_id.flatten())
}

pub async fn stall_name(conn: &mut AsyncPgConnection, stall_id: i32) -> Result<Option<String>> {
    let name: Option<String> = food_stalls::table
        .find(stall_id)
        .select(food_stalls::name)
        .first(conn)
        .await
        .optional()
        .context("Failed to get stall name")?;

    Ok(name)
}
