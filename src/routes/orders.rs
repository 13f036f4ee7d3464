use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    checkout::{self, CartLine, CheckoutRequest, PaymentDetails, ShippingDetails},
    middleware::{self, Caller},
    models::{OrderEntity, OrderItemEntity},
    status::OrderStatus,
    store::OrderUpdate,
    tracking::{self, Tracking},
};

/// Statuses a customer may put their own order into.
const CUSTOMER_STATUSES: [OrderStatus; 2] = [OrderStatus::Confirmed, OrderStatus::Cancelled];

/// Customer-facing order routes. Every route requires a signed-in caller.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_order))
        .routes(utoipa_axum::routes!(get_my_orders))
        .routes(utoipa_axum::routes!(get_my_order))
        .routes(utoipa_axum::routes!(update_my_order))
        .routes(utoipa_axum::routes!(track_order))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct OrderWithItems {
    pub order: OrderEntity,
    pub items: Vec<OrderItemEntity>,
}

/// Pair each order with its items, keeping the order of `orders`.
pub(crate) async fn attach_items(
    state: &AppState,
    orders: Vec<OrderEntity>,
) -> Result<Vec<OrderWithItems>, AppError> {
    let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let order_items = state
        .orders
        .list_order_items(order_ids)
        .await
        .context("Failed to get order items")?;

    let mut group: HashMap<Uuid, Vec<OrderItemEntity>> = HashMap::new();
    for item in order_items {
        group.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = group.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}

/// Apply a status and/or payment change, honouring the transition policy.
/// `owner: None` is the admin path.
pub(crate) async fn apply_order_update(
    state: &AppState,
    id: Uuid,
    owner: Option<Uuid>,
    status: Option<OrderStatus>,
    payment_method: Option<String>,
) -> Result<OrderEntity, AppError> {
    let allowed_from = match status {
        Some(target) => state
            .checkout
            .transition_policy
            .allowed_predecessors(target),
        None => OrderStatus::ALL.to_vec(),
    };

    let updated = state
        .orders
        .update_order(
            id,
            owner,
            OrderUpdate {
                status,
                allowed_from,
                payment_method,
            },
        )
        .await
        .context("Failed to update order")?;

    if let Some(order) = updated {
        info!(order_number = %order.order_number, status = %order.status, "Order updated");
        return Ok(order);
    }

    // Nothing matched: either the order is not visible to the caller or the
    // status guard refused the move.
    let current = state
        .orders
        .find_order(id, owner)
        .await
        .context("Failed to get order")?
        .ok_or(AppError::NotFound)?;

    Err(AppError::Conflict(format!(
        "Order {} cannot move from {} to {}",
        current.order_number,
        current.status,
        status.map_or("its current status", OrderStatus::as_str),
    )))
}

#[derive(Deserialize, ToSchema)]
pub struct CreateOrderReq {
    pub shipping: ShippingDetails,
    pub payment: PaymentDetails,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub discount: i64,
}

/// Place an order from the caller's cart.
#[utoipa::path(
    post,
    path = "/orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<OrderWithItems, String>),
        (status = 400, description = "Invalid cart, shipping or payment details"),
        (status = 401, description = "Not signed in")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let placed = checkout::prepare_order(
        CheckoutRequest {
            user_id: caller.user_id,
            shipping: body.shipping,
            payment: body.payment,
            lines: body.items,
            discount: body.discount,
        },
        &state.checkout,
        Utc::now(),
    )?;

    let (order, items) = state
        .orders
        .create_order(placed.order, placed.items)
        .await
        .context("Failed to place order")?;

    info!(
        order_number = %order.order_number,
        items = items.len(),
        total = order.total_amount,
        "Order placed"
    );

    Ok(StdResponse {
        data: Some(OrderWithItems { order, items }),
        message: Some("Create order successfully"),
    })
}

/// Fetch every order belonging to the caller, newest first.
#[utoipa::path(
    get,
    path = "/orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<OrderWithItems>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state
        .orders
        .list_orders(Some(caller.user_id), None)
        .await
        .context("Failed to get my orders")?;

    let orders = attach_items(&state, orders).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch one of the caller's orders.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderWithItems, String>),
        (status = 404, description = "No such order for this caller")
    )
)]
async fn get_my_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orders
        .find_order(id, Some(caller.user_id))
        .await
        .context("Failed to get order")?
        .ok_or(AppError::NotFound)?;

    let mut orders = attach_items(&state, vec![order]).await?;

    Ok(StdResponse {
        data: orders.pop(),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateMyOrderReq {
    pub status: Option<OrderStatus>,
    pub payment: Option<PaymentDetails>,
}

/// Confirm or cancel one of the caller's orders, or change its payment method.
#[utoipa::path(
    patch,
    path = "/orders/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateMyOrderReq,
    responses(
        (status = 200, description = "Updated order successfully", body = StdResponse<OrderEntity, String>),
        (status = 403, description = "Status is not one a customer may set"),
        (status = 404, description = "No such order for this caller"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
async fn update_my_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<UpdateMyOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.status.is_none() && body.payment.is_none() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    if let Some(status) = body.status {
        if !CUSTOMER_STATUSES.contains(&status) {
            return Err(AppError::ForbiddenResource(format!(
                "Customers may not set an order to {status}"
            )));
        }
    }

    let payment_method = body
        .payment
        .map(|payment| payment.masked_label())
        .transpose()?;

    let order =
        apply_order_update(&state, id, Some(caller.user_id), body.status, payment_method).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Update order successfully"),
    })
}

#[derive(Serialize, ToSchema)]
pub struct TrackOrderRes {
    pub order: OrderEntity,
    pub items: Vec<OrderItemEntity>,
    pub tracking: Tracking,
}

/// Show the delivery progress of an order by its order number.
#[utoipa::path(
    get,
    path = "/orders/track/{order_number}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("order_number" = String, Path, description = "Human-readable order number")
    ),
    responses(
        (status = 200, description = "Tracking information", body = StdResponse<TrackOrderRes, String>),
        (status = 404, description = "No such order for this caller")
    )
)]
async fn track_order(
    Path(order_number): Path<String>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orders
        .find_order_by_number(order_number)
        .await
        .context("Failed to get order")?
        .filter(|order| caller.is_admin() || order.user_id == caller.user_id)
        .ok_or(AppError::NotFound)?;

    let OrderWithItems { order, items } = attach_items(&state, vec![order])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;

    if let Some(gap) = order.totals_mismatch(&items) {
        warn!(order_number = %order.order_number, gap, "Order items do not add up to the order total");
    }

    let tracking = tracking::track(order.status);

    Ok(StdResponse {
        data: Some(TrackOrderRes {
            order,
            items,
            tracking,
        }),
        message: Some("Get order tracking successfully"),
    })
}
