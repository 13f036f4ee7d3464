use anyhow::Result;
use axum::Router;
use utoipa::openapi::{
    OpenApi,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

/// Serves the document at `/api-docs/openapi.json` and the UI at `/swagger-ui`,
/// with the bearer scheme the protected routes refer to.
pub fn create_swagger_ui(mut openapi: OpenApi) -> Result<Router> {
    let components = openapi.components.get_or_insert_with(Default::default);
    components.add_security_scheme(
        "bearerAuth",
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .build(),
        ),
    );

    Ok(Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi)))
}
