use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Associations, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{role::Role, status::OrderStatus};

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount: i64,
    pub total_amount: i64,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub payment_method: String,
    pub estimated_delivery: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderEntity {
    /// Signed gap between what the items add up to and what the order header
    /// claims they should (`total - shipping - discount`). `None` when they
    /// agree. The store does not enforce this, so callers audit it.
    pub fn totals_mismatch(&self, items: &[OrderItemEntity]) -> Option<i64> {
        let items_sum: i64 = items.iter().map(|item| item.subtotal).sum();
        let expected = self.total_amount - self.shipping_fee + self.discount;
        let gap = items_sum - expected;
        (gap != 0).then_some(gap)
    }
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount: i64,
    pub total_amount: i64,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub payment_method: String,
    pub estimated_delivery: Option<NaiveDate>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateOrderEntity {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderItemEntity {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
}

// Products

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: Uuid,
    pub producer_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub origin: Option<String>,
    pub region: Option<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateProductEntity {
    pub producer_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub origin: Option<String>,
    pub region: Option<String>,
    pub image_path: Option<String>,
}

/// Admin edits touch price and stock only.
#[derive(AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateProductEntity {
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

// Profiles

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileEntity {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateProfileEntity {
    pub full_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// Favorites

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::favorites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateFavoriteEntity {
    pub user_id: Uuid,
    pub product_id: Uuid,
}
