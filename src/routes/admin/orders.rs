use anyhow::Context;
use axum::{
    extract::State,
    response::IntoResponse,
};
use chrono::NaiveDate;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, dsl::exists};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::telegram,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    extract::{AppPath, AppQuery, MaybeJson},
    models::{OrderEntity, OrderStatus, OrderTransitionEntity},
    queries::{self, OrderDetails},
    schema::orders,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_pending_orders))
            .routes(utoipa_axum::routes!(list_all_orders))
            .routes(utoipa_axum::routes!(approve_order))
            .routes(utoipa_axum::routes!(reject_order))
            .routes(utoipa_axum::routes!(mark_order_ready))
            .routes(utoipa_axum::routes!(complete_order)),
    )
}

#[derive(Serialize, ToSchema)]
struct OrderRes {
    order: OrderEntity,
}

/// Pending orders, oldest first, with the ordering student attached.
#[utoipa::path(
    get,
    path = "/pending",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List pending orders", body = StdResponse<Vec<OrderDetails>, String>)
    )
)]
async fn list_pending_orders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<OrderEntity> = orders::table
        .filter(orders::status.eq(OrderStatus::Pending))
        .order_by(orders::created_at.asc())
        .select(OrderEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get pending orders")?;

    let orders = queries::load_order_details(conn, orders, true).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get pending orders successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AllOrdersQuery {
    /// Only return orders in this status.
    status: Option<String>,
    /// Only return orders created on this UTC day (`YYYY-MM-DD`).
    date: Option<String>,
}

/// Every order, newest first, optionally narrowed by status and day.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(AllOrdersQuery),
    responses(
        (status = 200, description = "List orders", body = StdResponse<Vec<OrderDetails>, String>),
        (status = 400, description = "Unknown status or malformed date")
    )
)]
async fn list_all_orders(
    AppQuery(query): AppQuery<AllOrdersQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|status| !status.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let day = query
        .date
        .as_deref()
        .filter(|date| !date.is_empty())
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                AppError::BadRequest(format!("'{date}' is not a valid date, expected YYYY-MM-DD"))
            })
        })
        .transpose()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut orders_query = orders::table.select(OrderEntity::as_select()).into_boxed();
    if let Some(status) = status {
        orders_query = orders_query.filter(orders::status.eq(status));
    }
    if let Some(day) = day {
        let (start, end) = super::utc_day_bounds(day);
        orders_query = orders_query
            .filter(orders::created_at.ge(start))
            .filter(orders::created_at.lt(end));
    }

    let orders: Vec<OrderEntity> = orders_query
        .order_by(orders::created_at.desc())
        .load(conn)
        .await
        .context("Failed to get orders")?;

    let orders = queries::load_order_details(conn, orders, true).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

/// Move an order into `changes.status`, but only from the status that
/// transition requires. The check and the write are one statement.
async fn transition_order(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    changes: OrderTransitionEntity,
) -> Result<OrderEntity, AppError> {
    let target = changes.status;
    let required = target
        .required_predecessor()
        .context("Orders cannot be moved back to pending")?;

    let updated: Option<OrderEntity> = diesel::update(
        orders::table
            .filter(orders::id.eq(order_id))
            .filter(orders::status.eq(required)),
    )
    .set(changes)
    .returning(OrderEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .context("Failed to update order status")?;

    if let Some(order) = updated {
        info!("Order #{} moved {} -> {}", order.id, required, target);
        return Ok(order);
    }

    let order_exists: bool = diesel::select(exists(orders::table.find(order_id)))
        .get_result(conn)
        .await
        .context("Failed to get order")?;

    if order_exists {
        Err(AppError::BadRequest(format!(
            "Order is not in {required} state"
        )))
    } else {
        Err(AppError::NotFound("Order not found".into()))
    }
}

/// Telegram chat of the student who placed `order`. `None` when Telegram is
/// off or the student never linked a chat.
async fn customer_chat_id(
    state: &AppState,
    conn: &mut AsyncPgConnection,
    order: &OrderEntity,
) -> Option<i64> {
    if !state.telegram.is_enabled() {
        return None;
    }
    match queries::user_telegram_id(conn, order.user_id).await {
        Ok(chat_id) => chat_id,
        Err(err) => {
            warn!("Failed to get customer chat of order #{}: {:#}", order.id, err);
            None
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
struct ApproveReq {
    /// Minutes until the order is ready.
    estimated_time: Option<i32>,
}

/// Approve a pending order.
#[utoipa::path(
    post,
    path = "/{id}/approve",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to approve")
    ),
    request_body = ApproveReq,
    responses(
        (status = 200, description = "Order approved", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Order is not pending"),
        (status = 404, description = "Order not found")
    )
)]
async fn approve_order(
    AppPath(id): AppPath<i32>,
    State(state): State<AppState>,
    MaybeJson(body): MaybeJson<ApproveReq>,
) -> Result<impl IntoResponse, AppError> {
    let body = body.unwrap_or_default();
    if body.estimated_time.is_some_and(|minutes| minutes < 0) {
        return Err(AppError::BadRequest(
            "estimated_time must not be negative".into(),
        ));
    }

    let (order, chat_id) = {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let order = transition_order(
            conn,
            id,
            OrderTransitionEntity {
                estimated_time: body.estimated_time,
                ..OrderTransitionEntity::to(OrderStatus::Approved)
            },
        )
        .await?;
        let chat_id = customer_chat_id(&state, conn, &order).await;
        (order, chat_id)
    };

    let message = telegram::order_approved_message(order.id, order.estimated_time);
    state.telegram.notify(chat_id, &message).await;

    Ok(StdResponse {
        data: Some(OrderRes { order }),
        message: Some("Order approved"),
    })
}

#[derive(Deserialize, ToSchema, Default)]
struct RejectReq {
    reason: Option<String>,
}

/// Reject a pending order.
#[utoipa::path(
    post,
    path = "/{id}/reject",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to reject")
    ),
    request_body = RejectReq,
    responses(
        (status = 200, description = "Order rejected", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Order is not pending"),
        (status = 404, description = "Order not found")
    )
)]
async fn reject_order(
    AppPath(id): AppPath<i32>,
    State(state): State<AppState>,
    MaybeJson(body): MaybeJson<RejectReq>,
) -> Result<impl IntoResponse, AppError> {
    let body = body.unwrap_or_default();
    let reason = body.reason.unwrap_or_default();

    let (order, chat_id) = {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let order = transition_order(
            conn,
            id,
            OrderTransitionEntity {
                rejection_reason: Some(reason.clone()),
                ..OrderTransitionEntity::to(OrderStatus::Rejected)
            },
        )
        .await?;
        let chat_id = customer_chat_id(&state, conn, &order).await;
        (order, chat_id)
    };

    let message = telegram::order_rejected_message(order.id, &reason);
    state.telegram.notify(chat_id, &message).await;

    Ok(StdResponse {
        data: Some(OrderRes { order }),
        message: Some("Order rejected"),
    })
}

/// Mark an approved order as ready for pickup.
#[utoipa::path(
    post,
    path = "/{id}/ready",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to mark as ready")
    ),
    responses(
        (status = 200, description = "Order marked as ready", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Order is not approved"),
        (status = 404, description = "Order not found")
    )
)]
async fn mark_order_ready(
    AppPath(id): AppPath<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let (order, chat_id, stall_name) = {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let order =
            transition_order(conn, id, OrderTransitionEntity::to(OrderStatus::Ready)).await?;
        let chat_id = customer_chat_id(&state, conn, &order).await;
        let stall_name = match chat_id {
            Some(_) => match queries::stall_name(conn, order.stall_id).await {
                Ok(name) => name,
                Err(err) => {
                    warn!("Failed to get stall of order #{}: {:#}", order.id, err);
                    None
                }
            },
            None => None,
        };
        (order, chat_id, stall_name)
    };

    let message = telegram::order_ready_message(
        order.id,
        stall_name.as_deref().unwrap_or("the stall"),
    );
    state.telegram.notify(chat_id, &message).await;

    Ok(StdResponse {
        data: Some(OrderRes { order }),
        message: Some("Order marked as ready"),
    })
}

/// Complete an order that has been picked up.
#[utoipa::path(
    post,
    path = "/{id}/complete",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to complete")
    ),
    responses(
        (status = 200, description = "Order completed", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Order is not ready"),
        (status = 404, description = "Order not found")
    )
)]
async fn complete_order(
    AppPath(id): AppPath<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order =
        transition_order(conn, id, OrderTransitionEntity::to(OrderStatus::Completed)).await?;

    Ok(StdResponse {
        data: Some(OrderRes { order }),
        message: Some("Order completed"),
    })
}
