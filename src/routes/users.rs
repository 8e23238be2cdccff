use anyhow::Context;
use axum::{Extension, extract::State, response::IntoResponse};
use diesel::{OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    extract::AppJson,
    middleware::{self, AuthUser},
    models::{UpdateUserEntity, UserEntity},
    schema::users,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/users",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_profile, update_profile))
            .route_layer(axum::middleware::from_fn(middleware::require_auth)),
    )
}

/// Fetch the authenticated user's profile.
#[utoipa::path(
    get,
    path = "/profile",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get profile successfully", body = StdResponse<UserEntity, String>),
        (status = 404, description = "User not found")
    )
)]
async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let profile: UserEntity = users::table
        .find(user.id)
        .select(UserEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get user")?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(StdResponse {
        data: Some(profile),
        message: Some("Get profile successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateProfileReq {
    name: Option<String>,
    phone: Option<String>,
    /// Telegram chat id that receives order notifications.
    telegram_id: Option<i64>,
}

/// Update name, phone or Telegram chat id of the authenticated user.
#[utoipa::path(
    put,
    path = "/profile",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    request_body = UpdateProfileReq,
    responses(
        (status = 200, description = "Updated profile successfully", body = StdResponse<UserEntity, String>),
        (status = 400, description = "No valid fields provided"),
        (status = 404, description = "User not found")
    )
)]
async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(body): AppJson<UpdateProfileReq>,
) -> Result<impl IntoResponse, AppError> {
    let changes = UpdateUserEntity {
        name: body.name,
        phone: body.phone,
        telegram_id: body.telegram_id,
    };
    if changes.is_empty() {
        return Err(AppError::BadRequest("No valid fields provided".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let profile: UserEntity = diesel::update(users::table.find(user.id))
        .set(changes)
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to update user")?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(StdResponse {
        data: Some(profile),
        message: Some("Updated profile successfully"),
    })
}
