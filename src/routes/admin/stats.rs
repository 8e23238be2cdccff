use std::collections::HashMap;

use anyhow::Context;
use axum::{extract::State, response::IntoResponse};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, dsl::sum};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    models::OrderStatus,
    schema::{menu_items, order_items, orders},
};

const POPULAR_ITEMS_LIMIT: usize = 5;

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(utoipa_axum::routes!(get_stats))
}

#[derive(Serialize, Debug, PartialEq, ToSchema)]
pub struct PopularItem {
    pub menu_item_id: i32,
    /// `None` once the menu item has been deleted.
    pub name: Option<String>,
    pub count: i64,
}

#[derive(Serialize, ToSchema)]
struct StatsRes {
    today_orders: i64,
    pending_orders: i64,
    today_revenue: f64,
    popular_items: Vec<PopularItem>,
}

/// Highest `(menu_item_id, quantity)` totals first, ties by lower id.
pub fn rank_popular(mut totals: Vec<(i32, i64)>, limit: usize) -> Vec<(i32, i64)> {
    totals.sort_by(|(a_id, a_count), (b_id, b_count)| {
        b_count.cmp(a_count).then(a_id.cmp(b_id))
    });
    totals.truncate(limit);
    totals
}

/// Today's order volume and revenue plus the all-time most ordered items.
#[utoipa::path(
    get,
    path = "/stats",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = StdResponse<StatsRes, String>)
    )
)]
async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let (today_start, _) = super::utc_day_bounds(Utc::now().date_naive());

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let today_orders: i64 = orders::table
        .filter(orders::created_at.ge(today_start))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count today's orders")?;

    let pending_orders: i64 = orders::table
        .filter(orders::status.eq(OrderStatus::Pending))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count pending orders")?;

    let today_revenue: Option<f64> = orders::table
        .filter(orders::created_at.ge(today_start))
        .filter(orders::status.eq_any(OrderStatus::REVENUE))
        .select(sum(orders::total_amount))
        .get_result(conn)
        .await
        .context("Failed to sum today's revenue")?;

    let totals: Vec<(i32, Option<i64>)> = order_items::table
        .group_by(order_items::menu_item_id)
        .select((order_items::menu_item_id, sum(order_items::quantity)))
        .load(conn)
        .await
        .context("Failed to count ordered items")?;

    let top = rank_popular(
        totals
            .into_iter()
            .map(|(id, count)| (id, count.unwrap_or(0)))
            .collect(),
        POPULAR_ITEMS_LIMIT,
    );

    let top_ids: Vec<i32> = top.iter().map(|(id, _)| *id).collect();
    let name_rows: Vec<(i32, String)> = menu_items::table
        .filter(menu_items::id.eq_any(&top_ids))
        .select((menu_items::id, menu_items::name))
        .load(conn)
        .await
        .context("Failed to get popular item names")?;
    let names: HashMap<i32, String> = name_rows.into_iter().collect();

    let popular_items = top
        .into_iter()
        .map(|(menu_item_id, count)| PopularItem {
            menu_item_id,
            name: names.get(&menu_item_id).cloned(),
            count,
        })
        .collect();

    Ok(StdResponse {
        data: Some(StatsRes {
            today_orders,
            pending_orders,
            today_revenue: today_revenue.unwrap_or(0.0),
            popular_items,
        }),
        message: Some("Get stats successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popular_items_rank_by_quantity_then_id() {
        let ranked = rank_popular(vec![(4, 3), (2, 10), (9, 3), (1, 3), (7, 1), (3, 8)], 5);
        assert_eq!(ranked, vec![(2, 10), (3, 8), (1, 3), (4, 3), (9, 3)]);
    }

    #[test]
    fn fewer_items_than_the_limit_are_all_kept() {
        assert_eq!(rank_popular(vec![(5, 2)], 5), vec![(5, 2)]);
        assert!(rank_popular(Vec::new(), 5).is_empty());
    }
}
