use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::supabase_auth::{AuthSession, SupabaseAuthError},
    app_error::{AppError, StdResponse},
    app_state::AppState,
    extract::AppJson,
    middleware,
    models::CreateUserEntity,
    schema::users,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/auth",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(register))
            .routes(utoipa_axum::routes!(login))
            .routes(utoipa_axum::routes!(logout)),
    )
}

#[derive(Deserialize, ToSchema)]
struct RegisterReq {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Deserialize, ToSchema)]
struct LoginReq {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn require_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "email and password are required".into(),
        ));
    }
    Ok(())
}

/// Register with Supabase Auth and create the matching profile row.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Auth"],
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Registered successfully", body = StdResponse<AuthSession, String>),
        (status = 400, description = "Missing credentials or rejected by Supabase Auth")
    )
)]
async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterReq>,
) -> Result<impl IntoResponse, AppError> {
    require_credentials(&body.email, &body.password)?;
    let email = body.email.trim().to_string();

    let auth = state
        .supabase_auth
        .sign_up(&email, &body.password)
        .await?;

    // The auth account exists at this point; a missing profile row can be
    // created later through the profile endpoint.
    if let Some(id) = auth.user_id() {
        let profile = CreateUserEntity {
            id,
            email,
            name: body.name,
            phone: body.phone,
        };
        match create_profile(&state, profile).await {
            Ok(()) => info!("Registered user {}", id),
            Err(err) => warn!("Failed to create profile for user {}: {:#}", id, err),
        }
    }

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(auth),
            message: Some("Registered successfully"),
        },
    ))
}

async fn create_profile(state: &AppState, profile: CreateUserEntity) -> anyhow::Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    diesel::insert_into(users::table)
        .values(profile)
        .on_conflict_do_nothing()
        .execute(conn)
        .await
        .context("Failed to insert user profile")?;

    Ok(())
}

/// Sign in with email and password.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Auth"],
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in successfully", body = StdResponse<AuthSession, String>),
        (status = 401, description = "Invalid credentials")
    )
)]
async fn login(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginReq>,
) -> Result<impl IntoResponse, AppError> {
    require_credentials(&body.email, &body.password)?;

    let auth = state
        .supabase_auth
        .sign_in_with_password(body.email.trim(), &body.password)
        .await
        .map_err(|err| match err {
            SupabaseAuthError::Rejected { message, .. } => AppError::Unauthorized(message),
            other => other.into(),
        })?;

    Ok(StdResponse {
        data: Some(auth),
        message: Some("Logged in successfully"),
    })
}

/// Revoke the caller's session. Always succeeds.
#[utoipa::path(
    post,
    path = "/logout",
    tags = ["Auth"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Logged out")
    )
)]
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = middleware::bearer_token(&headers) {
        if let Err(err) = state.supabase_auth.sign_out(token).await {
            debug!("Ignoring sign-out failure: {}", err);
        }
    }

    StdResponse::<(), &str> {
        data: None,
        message: Some("logged out"),
    }
}
