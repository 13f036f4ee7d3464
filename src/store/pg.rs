use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, pg::Pg};
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    checkout::NewOrderItem,
    db::DbPool,
    models::{
        CreateFavoriteEntity, CreateOrderEntity, CreateOrderItemEntity, CreateProductEntity,
        OrderEntity, OrderItemEntity, ProductEntity, ProfileEntity, UpdateOrderEntity,
        UpdateProductEntity, UpdateProfileEntity,
    },
    schema::{favorites, order_items, orders, products, profiles},
    store::{CatalogStore, OrderStore, OrderUpdate, ProfileStore},
};

#[derive(Clone)]
pub struct PgStore {
    db_pool: DbPool,
}

impl PgStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(
        &self,
        order: CreateOrderEntity,
        items: Vec<NewOrderItem>,
    ) -> Result<(OrderEntity, Vec<OrderItemEntity>)> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        // Rolling the transaction back is the compensating delete: a failed
        // item insert never leaves an order header without items behind.
        conn.transaction(move |conn| {
            Box::pin(async move {
                let created = diesel::insert_into(orders::table)
                    .values(&order)
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let rows: Vec<CreateOrderItemEntity> = items
                    .into_iter()
                    .map(|item| CreateOrderItemEntity {
                        order_id: created.id,
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                        subtotal: item.subtotal,
                    })
                    .collect();

                let items = diesel::insert_into(order_items::table)
                    .values(&rows)
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to create order items")?;

                Ok::<(OrderEntity, Vec<OrderItemEntity>), anyhow::Error>((created, items))
            })
        })
        .await
        .context("Transaction failed")
    }

    async fn find_order(&self, id: Uuid, owner: Option<Uuid>) -> Result<Option<OrderEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let mut query = orders::table
            .filter(orders::id.eq(id))
            .select(OrderEntity::as_select())
            .into_boxed::<Pg>();
        if let Some(owner) = owner {
            query = query.filter(orders::user_id.eq(owner));
        }

        query
            .first(conn)
            .await
            .optional()
            .context("Failed to get order")
    }

    async fn find_order_by_number(&self, order_number: String) -> Result<Option<OrderEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        orders::table
            .filter(orders::order_number.eq(order_number))
            .select(OrderEntity::as_select())
            .first(conn)
            .await
            .optional()
            .context("Failed to get order by number")
    }

    async fn list_orders(
        &self,
        owner: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<OrderEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let mut query = orders::table
            .select(OrderEntity::as_select())
            .order_by(orders::created_at.desc())
            .into_boxed::<Pg>();
        if let Some(owner) = owner {
            query = query.filter(orders::user_id.eq(owner));
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        query.load(conn).await.context("Failed to get orders")
    }

    async fn list_orders_since(&self, since: DateTime<Utc>) -> Result<Vec<OrderEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        orders::table
            .filter(orders::created_at.ge(since))
            .select(OrderEntity::as_select())
            .order_by(orders::created_at.asc())
            .load(conn)
            .await
            .context("Failed to get recent orders")
    }

    async fn list_order_items(&self, order_ids: Vec<Uuid>) -> Result<Vec<OrderItemEntity>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        order_items::table
            .filter(order_items::order_id.eq_any(order_ids))
            .select(OrderItemEntity::as_select())
            .order_by(order_items::id.asc())
            .load(conn)
            .await
            .context("Failed to get order items")
    }

    async fn update_order(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        update: OrderUpdate,
    ) -> Result<Option<OrderEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let changes = UpdateOrderEntity {
            status: update.status,
            payment_method: update.payment_method,
            updated_at: Utc::now(),
        };

        // Single conditional statement: concurrent writers race and the last
        // one the guard admits wins.
        let updated = match owner {
            Some(owner) => {
                diesel::update(
                    orders::table
                        .find(id)
                        .filter(orders::user_id.eq(owner))
                        .filter(orders::status.eq_any(update.allowed_from)),
                )
                .set(&changes)
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
            }
            None => {
                diesel::update(
                    orders::table
                        .find(id)
                        .filter(orders::status.eq_any(update.allowed_from)),
                )
                .set(&changes)
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
            }
        };

        updated.optional().context("Failed to update order")
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_products(&self) -> Result<Vec<ProductEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        products::table
            .select(ProductEntity::as_select())
            .order_by(products::created_at.desc())
            .load(conn)
            .await
            .context("Failed to get products")
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<ProductEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        products::table
            .find(id)
            .select(ProductEntity::as_select())
            .first(conn)
            .await
            .optional()
            .context("Failed to get product")
    }

    async fn create_product(&self, product: CreateProductEntity) -> Result<ProductEntity> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::insert_into(products::table)
            .values(&product)
            .returning(ProductEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create product")
    }

    async fn update_product(
        &self,
        id: Uuid,
        changes: UpdateProductEntity,
    ) -> Result<Option<ProductEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::update(products::table.find(id))
            .set(&changes)
            .returning(ProductEntity::as_returning())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to update product")
    }

    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<ProductEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        favorites::table
            .inner_join(products::table)
            .filter(favorites::user_id.eq(user_id))
            .order_by(favorites::created_at.desc())
            .select(ProductEntity::as_select())
            .load(conn)
            .await
            .context("Failed to get favorites")
    }

    async fn add_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<()> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::insert_into(favorites::table)
            .values(CreateFavoriteEntity {
                user_id,
                product_id,
            })
            .on_conflict_do_nothing()
            .execute(conn)
            .await
            .context("Failed to add favorite")?;

        Ok(())
    }

    async fn remove_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let removed = diesel::delete(
            favorites::table
                .filter(favorites::user_id.eq(user_id))
                .filter(favorites::product_id.eq(product_id)),
        )
        .execute(conn)
        .await
        .context("Failed to remove favorite")?;

        Ok(removed > 0)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        profiles::table
            .find(id)
            .select(ProfileEntity::as_select())
            .first(conn)
            .await
            .optional()
            .context("Failed to get profile")
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileEntity,
    ) -> Result<Option<ProfileEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::update(profiles::table.find(id))
            .set(&changes)
            .returning(ProfileEntity::as_returning())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to update profile")
    }
}
