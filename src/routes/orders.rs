use std::collections::BTreeSet;

use anyhow::Context;
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::telegram::{self, TelegramClient},
    app_error::{AppError, StdResponse},
    app_state::AppState,
    extract::{AppJson, AppPath, AppQuery},
    middleware::{self, AuthUser},
    models::{
        CreateOrderEntity, CreateOrderItemEntity, FoodStallEntity, MenuItemEntity, OrderEntity,
        OrderStatus, ROLE_ADMIN,
    },
    pricing::{self, OrderLine},
    queries::{self, OrderDetails},
    schema::{food_stalls, menu_items, order_items, orders, users},
};

/// Student-facing order routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_orders, create_order))
            .routes(utoipa_axum::routes!(get_order))
            .route_layer(axum::middleware::from_fn(middleware::require_auth)),
    )
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReq {
    stall_id: i32,
    #[serde(default)]
    items: Vec<OrderLine>,
}

#[derive(Serialize, ToSchema)]
struct CreateOrderRes {
    order_id: i32,
    total_amount: f64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

/// Place a new order at a stall for the authenticated student.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Order placed successfully", body = StdResponse<CreateOrderRes, String>),
        (status = 400, description = "Invalid order"),
        (status = 404, description = "User not found")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(body): AppJson<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    pricing::check_lines(&body.items)?;

    // Scoped so the connection goes back to the pool before Telegram is called.
    let (order, user_name, stall_name, admin_chats) = {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let user_name: Option<String> = users::table
            .find(user.id)
            .select(users::name)
            .first(conn)
            .await
            .optional()
            .context("Failed to get user")?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let stall: FoodStallEntity = food_stalls::table
            .find(body.stall_id)
            .filter(food_stalls::is_active.eq(true))
            .select(FoodStallEntity::as_select())
            .first(conn)
            .await
            .optional()
            .context("Failed to get stall")?
            .ok_or_else(|| AppError::BadRequest("Stall not found".into()))?;

        let menu_item_ids: Vec<i32> = body.items.iter().map(|line| line.menu_item_id).collect();
        let menu: Vec<MenuItemEntity> = menu_items::table
            .filter(menu_items::id.eq_any(&menu_item_ids))
            .select(MenuItemEntity::as_select())
            .load(conn)
            .await
            .context("Failed to get menu items")?;

        let priced = pricing::price_order(stall.id, &body.items, &menu)?;

        let user_id = user.id;
        let stall_id = stall.id;
        let order = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let order: OrderEntity = diesel::insert_into(orders::table)
                        .values(CreateOrderEntity {
                            user_id,
                            stall_id,
                            status: OrderStatus::Pending,
                            total_amount: priced.total_amount,
                        })
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to create order")?;

                    let order_items: Vec<CreateOrderItemEntity> = priced
                        .lines
                        .iter()
                        .map(|line| CreateOrderItemEntity {
                            order_id: order.id,
                            menu_item_id: line.menu_item_id,
                            quantity: line.quantity,
                            price_at_order: line.unit_price,
                        })
                        .collect();

                    diesel::insert_into(order_items::table)
                        .values(order_items)
                        .execute(conn)
                        .await
                        .context("Failed to create order items")?;

                    Ok::<OrderEntity, AppError>(order)
                })
            })
            .await?;

        let admin_chats = admin_chat_ids(&state.telegram, conn).await;
        (order, user_name, stall.name, admin_chats)
    };

    info!(
        "Order #{} placed by {} at stall {} for {:.2}",
        order.id, order.user_id, order.stall_id, order.total_amount
    );

    let message = telegram::new_order_message(
        order.id,
        user_name.as_deref(),
        &stall_name,
        order.total_amount,
    );
    for chat_id in admin_chats {
        state.telegram.notify(Some(chat_id), &message).await;
    }

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(CreateOrderRes {
                order_id: order.id,
                total_amount: order.total_amount,
                status: order.status,
                created_at: order.created_at,
            }),
            message: Some("Order placed successfully"),
        },
    ))
}

/// Chats that hear about new orders: every admin with a linked Telegram
/// chat plus the configured admin chat. Empty when Telegram is off.
async fn admin_chat_ids(telegram: &TelegramClient, conn: &mut AsyncPgConnection) -> BTreeSet<i64> {
    if !telegram.is_enabled() {
        return BTreeSet::new();
    }

    let admin_chats: Vec<Option<i64>> = match users::table
        .filter(users::role.eq(ROLE_ADMIN))
        .filter(users::telegram_id.is_not_null())
        .select(users::telegram_id)
        .load(conn)
        .await
    {
        Ok(chats) => chats,
        Err(err) => {
            warn!("Failed to load admin chats: {}", err);
            Vec::new()
        }
    };

    admin_chats
        .into_iter()
        .flatten()
        .chain(telegram.admin_chat_id())
        .collect()
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListOrdersQuery {
    /// Only return orders in this status.
    status: Option<String>,
}

/// List the authenticated student's orders, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<OrderDetails>, String>),
        (status = 400, description = "Unknown status")
    )
)]
async fn list_orders(
    AppQuery(query): AppQuery<ListOrdersQuery>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|status| !status.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut orders_query = orders::table
        .select(OrderEntity::as_select())
        .filter(orders::user_id.eq(user.id))
        .into_boxed();
    if let Some(status) = status {
        orders_query = orders_query.filter(orders::status.eq(status));
    }

    let orders: Vec<OrderEntity> = orders_query
        .order_by(orders::created_at.desc())
        .load(conn)
        .await
        .context("Failed to get my orders")?;

    let orders = queries::load_order_details(conn, orders, false).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch one of the authenticated student's orders.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderDetails, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    AppPath(id): AppPath<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = orders::table
        .find(id)
        .filter(orders::user_id.eq(user.id))
        .select(OrderEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get order")?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    let order = queries::load_order_details(conn, vec![order], false)
        .await?
        .pop()
        .context("Order details missing")?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}
