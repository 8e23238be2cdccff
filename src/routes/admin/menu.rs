use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{OptionalExtension, QueryDsl, SelectableHelper, dsl::exists};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    extract::{AppJson, AppPath},
    models::{CreateMenuItemEntity, MenuCategory, MenuItemEntity, UpdateMenuItemEntity},
    schema::{food_stalls, menu_items},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/menu/items",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_menu_item))
            .routes(utoipa_axum::routes!(update_menu_item, delete_menu_item)),
    )
}

#[derive(Serialize, ToSchema)]
struct MenuItemRes {
    item: MenuItemEntity,
}

fn check_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    Ok(())
}

#[derive(Deserialize, ToSchema)]
struct CreateMenuItemReq {
    stall_id: i32,
    name: String,
    price: f64,
    /// One of `main`, `snack`, `beverage`, `dessert`.
    category: String,
    description: Option<String>,
    is_available: Option<bool>,
    image_url: Option<String>,
}

/// Add an item to a stall's menu.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    request_body = CreateMenuItemReq,
    responses(
        (status = 201, description = "Item created", body = StdResponse<MenuItemRes, String>),
        (status = 400, description = "Invalid item or unknown stall")
    )
)]
async fn create_menu_item(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateMenuItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    check_price(body.price)?;
    let category: MenuCategory = body
        .category
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid category".into()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let stall_exists: bool = diesel::select(exists(food_stalls::table.find(body.stall_id)))
        .get_result(conn)
        .await
        .context("Failed to get stall")?;
    if !stall_exists {
        return Err(AppError::BadRequest("Stall not found".into()));
    }

    let item: MenuItemEntity = diesel::insert_into(menu_items::table)
        .values(CreateMenuItemEntity {
            stall_id: body.stall_id,
            name,
            description: body.description,
            price: body.price,
            category,
            is_available: body.is_available.unwrap_or(true),
            image_url: body.image_url,
        })
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create menu item")?;

    info!("Menu item #{} added to stall {}", item.id, item.stall_id);

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(MenuItemRes { item }),
            message: Some("Item created"),
        },
    ))
}

#[derive(Deserialize, ToSchema)]
struct UpdateMenuItemReq {
    name: Option<String>,
    price: Option<f64>,
    is_available: Option<bool>,
    image_url: Option<String>,
}

/// Change name, price, availability or image of a menu item.
#[utoipa::path(
    put,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Menu item ID to update")
    ),
    request_body = UpdateMenuItemReq,
    responses(
        (status = 200, description = "Item updated", body = StdResponse<MenuItemRes, String>),
        (status = 400, description = "No valid fields provided"),
        (status = 404, description = "Item not found")
    )
)]
async fn update_menu_item(
    AppPath(id): AppPath<i32>,
    State(state): State<AppState>,
    AppJson(body): AppJson<UpdateMenuItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let changes = UpdateMenuItemEntity {
        name: body
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        price: body.price,
        is_available: body.is_available,
        image_url: body.image_url,
    };
    if changes.is_empty() {
        return Err(AppError::BadRequest("No valid fields provided".into()));
    }
    if let Some(price) = changes.price {
        check_price(price)?;
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: MenuItemEntity = diesel::update(menu_items::table.find(id))
        .set(changes)
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to update menu item")?
        .ok_or_else(|| AppError::NotFound("Item not found".into()))?;

    Ok(StdResponse {
        data: Some(MenuItemRes { item }),
        message: Some("Item updated"),
    })
}

/// Remove a menu item. Past orders keep their line items.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Menu item ID to delete")
    ),
    responses(
        (status = 200, description = "Item deleted"),
        (status = 404, description = "Item not found")
    )
)]
async fn delete_menu_item(
    AppPath(id): AppPath<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted = diesel::delete(menu_items::table.find(id))
        .execute(conn)
        .await
        .context("Failed to delete menu item")?;
    if deleted == 0 {
        return Err(AppError::NotFound("Item not found".into()));
    }

    info!("Menu item #{} deleted", id);

    Ok(StdResponse::<(), &str> {
        data: None,
        message: Some("Item deleted"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_must_be_finite_and_non_negative() {
        assert!(check_price(0.0).is_ok());
        assert!(check_price(45.5).is_ok());
        assert!(check_price(-1.0).is_err());
        assert!(check_price(f64::NAN).is_err());
        assert!(check_price(f64::INFINITY).is_err());
    }
}
