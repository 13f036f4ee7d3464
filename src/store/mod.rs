//! Data access seams. Handlers only talk to these traits; [`pg::PgStore`]
//! implements all of them on top of the shared connection pool.

pub mod pg;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    checkout::NewOrderItem,
    models::{
        CreateOrderEntity, CreateProductEntity, OrderEntity, OrderItemEntity, ProductEntity,
        ProfileEntity, UpdateProductEntity, UpdateProfileEntity,
    },
    status::OrderStatus,
};

pub use pg::PgStore;

/// A change to an existing order. The write only lands if the row's current
/// status is one of `allowed_from`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub allowed_from: Vec<OrderStatus>,
    pub payment_method: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the order header and one row per item as a single unit. Either
    /// both land or neither does.
    async fn create_order(
        &self,
        order: CreateOrderEntity,
        items: Vec<NewOrderItem>,
    ) -> Result<(OrderEntity, Vec<OrderItemEntity>)>;

    /// Look an order up, optionally restricted to one owner.
    async fn find_order(&self, id: Uuid, owner: Option<Uuid>) -> Result<Option<OrderEntity>>;

    async fn find_order_by_number(&self, order_number: String) -> Result<Option<OrderEntity>>;

    /// Newest first. `owner: None` lists every order.
    async fn list_orders(&self, owner: Option<Uuid>, limit: Option<i64>)
    -> Result<Vec<OrderEntity>>;

    async fn list_orders_since(&self, since: DateTime<Utc>) -> Result<Vec<OrderEntity>>;

    async fn list_order_items(&self, order_ids: Vec<Uuid>) -> Result<Vec<OrderItemEntity>>;

    /// `Ok(None)` when no row matched the id, owner and status guard.
    async fn update_order(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        update: OrderUpdate,
    ) -> Result<Option<OrderEntity>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<ProductEntity>>;

    async fn find_product(&self, id: Uuid) -> Result<Option<ProductEntity>>;

    async fn create_product(&self, product: CreateProductEntity) -> Result<ProductEntity>;

    async fn update_product(
        &self,
        id: Uuid,
        changes: UpdateProductEntity,
    ) -> Result<Option<ProductEntity>>;

    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<ProductEntity>>;

    /// Idempotent: favoriting twice keeps one row.
    async fn add_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<()>;

    /// Returns whether a row was removed.
    async fn remove_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileEntity>>;

    async fn update_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileEntity,
    ) -> Result<Option<ProfileEntity>>;
}
