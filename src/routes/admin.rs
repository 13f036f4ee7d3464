use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{Days, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, RoleGuard},
    models::{OrderEntity, ProductEntity, UpdateProductEntity},
    routes::orders::{OrderWithItems, apply_order_update, attach_items},
    stats::{self, DailySales, OrderStats},
    status::OrderStatus,
};

const RECENT_ORDERS: i64 = 10;
const ANALYTICS_DAYS: u64 = 7;

/// Admin-only routes: order management, dashboard figures and catalog edits.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(update_order))
        .routes(utoipa_axum::routes!(get_order_stats))
        .routes(utoipa_axum::routes!(get_recent_orders))
        .routes(utoipa_axum::routes!(get_analytics))
        .routes(utoipa_axum::routes!(update_product))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGuard::ADMIN,
            middleware::require_role,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
}

#[derive(Deserialize, ToSchema)]
pub struct AdminUpdateOrderReq {
    pub status: OrderStatus,
}

/// Move any order to a new status.
#[utoipa::path(
    patch,
    path = "/admin/orders/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = AdminUpdateOrderReq,
    responses(
        (status = 200, description = "Updated order successfully", body = StdResponse<OrderEntity, String>),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such order"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
async fn update_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<AdminUpdateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let order = apply_order_update(&state, id, None, Some(body.status), None).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Update order successfully"),
    })
}

/// Order counts per status and revenue figures over every order.
#[utoipa::path(
    get,
    path = "/admin/orders-stats",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Order statistics", body = StdResponse<OrderStats, String>)
    )
)]
async fn get_order_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let orders = state
        .orders
        .list_orders(None, None)
        .await
        .context("Failed to get orders")?;

    Ok(StdResponse {
        data: Some(stats::summarize(&orders)),
        message: Some("Get order stats successfully"),
    })
}

#[derive(Serialize, ToSchema)]
pub struct RecentOrder {
    #[serde(flatten)]
    pub order: OrderWithItems,
    /// Whether the items add up to the stored totals.
    pub totals_consistent: bool,
}

/// The latest orders across all customers, with their items.
#[utoipa::path(
    get,
    path = "/admin/recent-orders",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Most recent orders", body = StdResponse<Vec<RecentOrder>, String>)
    )
)]
async fn get_recent_orders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let orders = state
        .orders
        .list_orders(None, Some(RECENT_ORDERS))
        .await
        .context("Failed to get recent orders")?;

    let recent: Vec<RecentOrder> = attach_items(&state, orders)
        .await?
        .into_iter()
        .map(|order| {
            let gap = order.order.totals_mismatch(&order.items);
            if let Some(gap) = gap {
                warn!(
                    order_number = %order.order.order_number,
                    gap,
                    "Order items do not add up to the order total"
                );
            }
            RecentOrder {
                order,
                totals_consistent: gap.is_none(),
            }
        })
        .collect();

    Ok(StdResponse {
        data: Some(recent),
        message: Some("Get recent orders successfully"),
    })
}

/// Orders and revenue per day over the last week, today included.
#[utoipa::path(
    get,
    path = "/admin/analytics",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Daily sales", body = StdResponse<Vec<DailySales>, String>)
    )
)]
async fn get_analytics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();
    let since = today
        .checked_sub_days(Days::new(ANALYTICS_DAYS - 1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|start| start.and_utc())
        .context("Analytics window out of range")?;

    let orders = state
        .orders
        .list_orders_since(since)
        .await
        .context("Failed to get orders for analytics")?;

    Ok(StdResponse {
        data: Some(stats::daily_sales(&orders, today, ANALYTICS_DAYS)),
        message: Some("Get analytics successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
pub struct AdminUpdateProductReq {
    pub price: Option<i64>,
    pub stock: Option<i32>,
}

/// Change a product's price or stock.
#[utoipa::path(
    patch,
    path = "/admin/products/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Product ID to update")
    ),
    request_body = AdminUpdateProductReq,
    responses(
        (status = 200, description = "Updated product successfully", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Nothing to update or negative values"),
        (status = 404, description = "No such product")
    )
)]
async fn update_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<AdminUpdateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.price.is_none() && body.stock.is_none() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }
    if body.price.is_some_and(|price| price < 0) {
        return Err(AppError::BadRequest("Price must not be negative".into()));
    }
    if body.stock.is_some_and(|stock| stock < 0) {
        return Err(AppError::BadRequest("Stock must not be negative".into()));
    }

    let product = state
        .catalog
        .update_product(
            id,
            UpdateProductEntity {
                price: body.price,
                stock: body.stock,
                updated_at: Utc::now(),
            },
        )
        .await
        .context("Failed to update product")?
        .ok_or(AppError::NotFound)?;

    info!(product_id = %product.id, price = product.price, stock = product.stock, "Product updated");

    Ok(StdResponse {
        data: Some(product),
        message: Some("Update product successfully"),
    })
}
