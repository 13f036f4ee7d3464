use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, Caller},
    routes::products::ProductView,
};

/// The caller's favorite products.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_favorites))
        .routes(utoipa_axum::routes!(add_favorite, remove_favorite))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
}

#[utoipa::path(
    get,
    path = "/favorites",
    tags = ["Favorites"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List favorite products", body = StdResponse<Vec<ProductView>, String>)
    )
)]
async fn get_favorites(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let favorites: Vec<ProductView> = state
        .catalog
        .list_favorites(caller.user_id)
        .await
        .context("Failed to get favorites")?
        .into_iter()
        .map(|product| ProductView::new(product, &state.storage))
        .collect();

    Ok(StdResponse {
        data: Some(favorites),
        message: Some("Get favorites successfully"),
    })
}

/// Favorite a product. Favoriting it again is a no-op.
#[utoipa::path(
    put,
    path = "/favorites/{product_id}",
    tags = ["Favorites"],
    security(("bearerAuth" = [])),
    params(
        ("product_id" = Uuid, Path, description = "Product to favorite")
    ),
    responses(
        (status = 200, description = "Added favorite successfully", body = StdResponse<Uuid, String>),
        (status = 404, description = "No such product")
    )
)]
async fn add_favorite(
    Path(product_id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    state
        .catalog
        .find_product(product_id)
        .await
        .context("Failed to get product")?
        .ok_or(AppError::NotFound)?;

    state
        .catalog
        .add_favorite(caller.user_id, product_id)
        .await
        .context("Failed to add favorite")?;

    Ok(StdResponse {
        data: Some(product_id),
        message: Some("Add favorite successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/favorites/{product_id}",
    tags = ["Favorites"],
    security(("bearerAuth" = [])),
    params(
        ("product_id" = Uuid, Path, description = "Product to unfavorite")
    ),
    responses(
        (status = 200, description = "Removed favorite successfully", body = StdResponse<Uuid, String>),
        (status = 404, description = "Product was not a favorite")
    )
)]
async fn remove_favorite(
    Path(product_id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .catalog
        .remove_favorite(caller.user_id, product_id)
        .await
        .context("Failed to remove favorite")?;

    if !removed {
        return Err(AppError::NotFound);
    }

    Ok(StdResponse {
        data: Some(product_id),
        message: Some("Remove favorite successfully"),
    })
}
