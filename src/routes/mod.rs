pub mod admin;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod profile;

use axum::response::IntoResponse;
use utoipa_axum::router::OpenApiRouter;

use crate::{app_error::StdResponse, app_state::AppState};

/// Every router of the service, each carrying its own auth layers.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(health))
        .merge(orders::routes_with_openapi(state))
        .merge(admin::routes_with_openapi(state))
        .merge(products::routes_with_openapi(state))
        .merge(favorites::routes_with_openapi(state))
        .merge(profile::routes_with_openapi(state))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tags = ["Health"],
    responses(
        (status = 200, description = "Service is up", body = StdResponse<String, String>)
    )
)]
async fn health() -> impl IntoResponse {
    StdResponse::<String, _> {
        data: None,
        message: Some("OK"),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use testresult::TestResult;
    use tower::ServiceExt;

    use crate::test_helpers::{TestState, request};

    use super::*;

    #[tokio::test]
    async fn health_needs_no_token() -> TestResult {
        let state = TestState::new().build();
        let (router, _) = routes_with_openapi(&state).split_for_parts();

        let res = router
            .with_state(state)
            .oneshot(request(Method::GET, "/health", None, None))
            .await?;

        assert_eq!(res.status(), StatusCode::OK);
        Ok(())
    }

    #[test]
    fn every_route_is_documented() {
        let state = TestState::new().build();
        let (_, openapi) = routes_with_openapi(&state).split_for_parts();
        let paths: Vec<&str> = openapi.paths.paths.keys().map(String::as_str).collect();

        for path in [
            "/orders",
            "/orders/{id}",
            "/orders/track/{order_number}",
            "/admin/orders/{id}",
            "/admin/orders-stats",
            "/admin/recent-orders",
            "/admin/analytics",
            "/admin/products/{id}",
            "/products",
            "/products/{id}",
            "/producer/products",
            "/favorites",
            "/favorites/{product_id}",
            "/profile",
            "/auth/sign-out",
            "/health",
        ] {
            assert!(paths.contains(&path), "{path} missing from the OpenAPI document");
        }
    }
}
