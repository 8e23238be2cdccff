pub mod admin;
pub mod auth;
pub mod health;
pub mod menu;
pub mod orders;
pub mod users;

use utoipa_axum::router::OpenApiRouter;

use crate::app_state::AppState;

/// Every route of the service, with its OpenAPI description.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(health::routes_with_openapi())
        .merge(auth::routes_with_openapi())
        .merge(users::routes_with_openapi())
        .merge(menu::routes_with_openapi())
        .merge(orders::routes_with_openapi())
        .merge(admin::routes_with_openapi())
}
