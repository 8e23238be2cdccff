use utoipa::openapi::{
    Components, OpenApi,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

pub const SWAGGER_UI_PATH: &str = "/swagger-ui";
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Serve `openapi` through Swagger UI, registering the `bearerAuth` scheme
/// that protected routes refer to.
pub fn create_swagger_ui(mut openapi: OpenApi) -> SwaggerUi {
    openapi
        .components
        .get_or_insert_with(Components::default)
        .add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );

    SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, openapi)
}
