use anyhow::Context;
use axum::{
    extract::State,
    response::IntoResponse,
};
use diesel::{
    ExpressionMethods, OptionalExtension, PgTextExpressionMethods, QueryDsl, SelectableHelper,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    extract::{AppPath, AppQuery},
    models::{FoodStallEntity, MenuCategory, MenuItemEntity},
    schema::{food_stalls, menu_items},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/menu",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_stalls))
            .routes(utoipa_axum::routes!(list_stall_items))
            .routes(utoipa_axum::routes!(get_item))
            .routes(utoipa_axum::routes!(search_menu)),
    )
}

/// List all active food stalls.
#[utoipa::path(
    get,
    path = "/stalls",
    tags = ["Menu"],
    responses(
        (status = 200, description = "List stalls", body = StdResponse<Vec<FoodStallEntity>, String>)
    )
)]
async fn list_stalls(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let stalls: Vec<FoodStallEntity> = food_stalls::table
        .filter(food_stalls::is_active.eq(true))
        .order_by(food_stalls::name.asc())
        .select(FoodStallEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get stalls")?;

    Ok(StdResponse {
        data: Some(stalls),
        message: Some("Get stalls successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct StallItemsQuery {
    /// One of `main`, `snack`, `beverage`, `dessert`.
    category: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct StallItemsRes {
    stall_id: i32,
    items: Vec<MenuItemEntity>,
}

/// List the available items of a stall, optionally narrowed to one category.
#[utoipa::path(
    get,
    path = "/stalls/{stall_id}/items",
    tags = ["Menu"],
    params(
        ("stall_id" = i32, Path, description = "Stall to list items for"),
        StallItemsQuery
    ),
    responses(
        (status = 200, description = "List stall items", body = StdResponse<StallItemsRes, String>),
        (status = 400, description = "Unknown category")
    )
)]
async fn list_stall_items(
    AppPath(stall_id): AppPath<i32>,
    AppQuery(query): AppQuery<StallItemsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let category = query
        .category
        .as_deref()
        .filter(|category| !category.is_empty())
        .map(str::parse::<MenuCategory>)
        .transpose()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut items_query = menu_items::table
        .select(MenuItemEntity::as_select())
        .filter(menu_items::stall_id.eq(stall_id))
        .filter(menu_items::is_available.eq(true))
        .into_boxed();
    if let Some(category) = category {
        items_query = items_query.filter(menu_items::category.eq(category));
    }

    let items: Vec<MenuItemEntity> = items_query
        .order_by((menu_items::category.asc(), menu_items::name.asc()))
        .load(conn)
        .await
        .context("Failed to get menu items")?;

    Ok(StdResponse {
        data: Some(StallItemsRes { stall_id, items }),
        message: Some("Get stall items successfully"),
    })
}

/// Fetch a single menu item.
#[utoipa::path(
    get,
    path = "/items/{item_id}",
    tags = ["Menu"],
    params(
        ("item_id" = i32, Path, description = "Menu item ID to fetch")
    ),
    responses(
        (status = 200, description = "Get item successfully", body = StdResponse<MenuItemEntity, String>),
        (status = 404, description = "Item not found")
    )
)]
async fn get_item(
    AppPath(item_id): AppPath<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: MenuItemEntity = menu_items::table
        .find(item_id)
        .select(MenuItemEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get menu item")?
        .ok_or_else(|| AppError::NotFound("Item not found".into()))?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Get item successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SearchQuery {
    /// Text to look for in item names.
    q: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct SearchResult {
    #[serde(flatten)]
    item: MenuItemEntity,
    stall_name: String,
}

#[derive(Serialize, ToSchema)]
struct SearchRes {
    query: String,
    results: Vec<SearchResult>,
}

/// `ILIKE` pattern matching `q` anywhere, with wildcards in `q` taken literally.
pub fn contains_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive search over available item names.
#[utoipa::path(
    get,
    path = "/search",
    tags = ["Menu"],
    params(SearchQuery),
    responses(
        (status = 200, description = "Search results", body = StdResponse<SearchRes, String>),
        (status = 400, description = "Missing query")
    )
)]
async fn search_menu(
    AppQuery(query): AppQuery<SearchQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(AppError::BadRequest("query parameter q is required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<(MenuItemEntity, String)> = menu_items::table
        .inner_join(food_stalls::table)
        .filter(menu_items::name.ilike(contains_pattern(q)))
        .filter(menu_items::is_available.eq(true))
        .order_by(menu_items::name.asc())
        .select((MenuItemEntity::as_select(), food_stalls::name))
        .load(conn)
        .await
        .context("Failed to search menu items")?;

    let results = rows
        .into_iter()
        .map(|(item, stall_name)| SearchResult { item, stall_name })
        .collect();

    Ok(StdResponse {
        data: Some(SearchRes {
            query: q.to_string(),
            results,
        }),
        message: Some("Search completed successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_query_in_wildcards() {
        assert_eq!(contains_pattern("dosa"), "%dosa%");
    }

    #[test]
    fn pattern_escapes_like_metacharacters() {
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("back\\slash"), "%back\\\\slash%");
    }
}
