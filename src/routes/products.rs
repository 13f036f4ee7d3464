use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    api::storage::ObjectStorage,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, Caller, RoleGuard},
    models::{CreateProductEntity, ProductEntity},
};

/// Public catalog reads plus product creation for producers.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    let producer = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_product))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGuard::PRODUCER,
            middleware::require_role,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_products))
        .routes(utoipa_axum::routes!(get_product))
        .merge(producer)
}

/// A product as shown to clients, with its image resolved to a public URL.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: ProductEntity,
    pub image_url: Option<String>,
}

impl ProductView {
    pub fn new(product: ProductEntity, storage: &ObjectStorage) -> Self {
        let image_url = product
            .image_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| storage.public_url(path));
        Self { product, image_url }
    }
}

/// List the whole catalog.
#[utoipa::path(
    get,
    path = "/products",
    tags = ["Products"],
    responses(
        (status = 200, description = "List products", body = StdResponse<Vec<ProductView>, String>)
    )
)]
async fn get_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let products: Vec<ProductView> = state
        .catalog
        .list_products()
        .await
        .context("Failed to get products")?
        .into_iter()
        .map(|product| ProductView::new(product, &state.storage))
        .collect();

    Ok(StdResponse {
        data: Some(products),
        message: Some("Get products successfully"),
    })
}

/// Fetch a single product.
#[utoipa::path(
    get,
    path = "/products/{id}",
    tags = ["Products"],
    params(
        ("id" = Uuid, Path, description = "Product ID to fetch")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<ProductView, String>),
        (status = 404, description = "No such product")
    )
)]
async fn get_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .catalog
        .find_product(id)
        .await
        .context("Failed to get product")?
        .ok_or(AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(ProductView::new(product, &state.storage)),
        message: Some("Get product successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProductReq {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub origin: Option<String>,
    pub region: Option<String>,
    /// Object path inside the product bucket.
    pub image_path: Option<String>,
}

impl CreateProductReq {
    fn into_entity(self, producer_id: Uuid) -> Result<CreateProductEntity, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Product name is required".into()));
        }
        if self.price < 0 {
            return Err(AppError::BadRequest("Price must not be negative".into()));
        }
        if self.stock < 0 {
            return Err(AppError::BadRequest("Stock must not be negative".into()));
        }

        Ok(CreateProductEntity {
            producer_id: Some(producer_id),
            name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            origin: self.origin,
            region: self.region,
            image_path: self.image_path,
        })
    }
}

/// Add a product to the catalog, owned by the calling producer.
#[utoipa::path(
    post,
    path = "/producer/products",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    request_body = CreateProductReq,
    responses(
        (status = 200, description = "Created product successfully", body = StdResponse<ProductView, String>),
        (status = 400, description = "Invalid product"),
        (status = 403, description = "Caller is not a producer")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<CreateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .catalog
        .create_product(body.into_entity(caller.user_id)?)
        .await
        .context("Failed to create product")?;

    info!(product_id = %product.id, producer_id = %caller.user_id, "Product created");

    Ok(StdResponse {
        data: Some(ProductView::new(product, &state.storage)),
        message: Some("Create product successfully"),
    })
}
