//! Test helpers: in-memory stand-ins for the hosted services and a builder
//! for [`AppState`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    api::{
        identity::IdentityProvider,
        storage::ObjectStorage,
    },
    app_state::AppState,
    checkout::NewOrderItem,
    config::{CheckoutConfig, ProfileCacheConfig, StorageConfig},
    models::{CreateOrderEntity, OrderEntity, OrderItemEntity, ProfileEntity, UpdateProfileEntity},
    profile_cache::ProfileCache,
    role::Role,
    status::{OrderStatus, TransitionPolicy},
    store::{CatalogStore, MockCatalogStore, OrderStore, OrderUpdate, ProfileStore},
};

pub(crate) fn profile(id: Uuid, role: Role) -> ProfileEntity {
    let now = Utc::now();
    ProfileEntity {
        id,
        full_name: Some("Test User".into()),
        role,
        created_at: now,
        updated_at: now,
    }
}

/// A stored order with sensible defaults, for seeding [`MemoryOrderStore`].
pub(crate) fn order(user_id: Uuid, status: OrderStatus, created_at: DateTime<Utc>) -> OrderEntity {
    OrderEntity {
        id: Uuid::new_v4(),
        order_number: format!("ORD-{}", created_at.timestamp_millis()),
        user_id,
        status,
        subtotal: 90_000,
        shipping_fee: 12_000,
        discount: 0,
        total_amount: 102_000,
        shipping_name: "Dewi".into(),
        shipping_phone: "0812-000-111".into(),
        shipping_address: "Jl. Aceh 5".into(),
        shipping_city: "Bandung".into(),
        shipping_postal_code: "40115".into(),
        payment_method: "Bank transfer".into(),
        estimated_delivery: None,
        created_at,
        updated_at: created_at,
    }
}

pub(crate) async fn body_text(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub(crate) async fn body_json(res: Response) -> Value {
    serde_json::from_str(&body_text(res).await).unwrap_or(Value::Null)
}

pub(crate) fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap_or_default()
}

/// Identity provider that knows a fixed set of tokens.
#[derive(Default)]
pub(crate) struct FakeIdentity {
    users: HashMap<String, Uuid>,
    pub(crate) signed_out: Mutex<Vec<String>>,
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_user(&self, token: &str) -> Result<Option<Uuid>> {
        Ok(self.users.get(token).copied())
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        if let Ok(mut signed_out) = self.signed_out.lock() {
            signed_out.push(token.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeProfiles {
    profiles: Mutex<HashMap<Uuid, ProfileEntity>>,
}

impl FakeProfiles {
    fn insert(&self, profile: ProfileEntity) {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(profile.id, profile);
        }
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileEntity>> {
        Ok(self
            .profiles
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .get(&id)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileEntity,
    ) -> Result<Option<ProfileEntity>> {
        let mut profiles = self.profiles.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(profiles.get_mut(&id).map(|profile| {
            if let Some(full_name) = changes.full_name {
                profile.full_name = Some(full_name);
            }
            profile.updated_at = changes.updated_at;
            profile.clone()
        }))
    }
}

#[derive(Default)]
struct MemoryTables {
    orders: Vec<OrderEntity>,
    items: Vec<OrderItemEntity>,
    next_item_id: i32,
    /// Every status write that landed, in commit order.
    status_writes: Vec<(Uuid, OrderStatus)>,
    create_attempts: usize,
}

/// Order store backed by vectors. Mirrors the guarantees of the Postgres
/// store: order and items land together or not at all, and status updates
/// are single guarded writes.
#[derive(Default)]
pub(crate) struct MemoryOrderStore {
    tables: Mutex<MemoryTables>,
    fail_item_insert: bool,
}

impl MemoryOrderStore {
    /// A store whose item insert always fails after the header was written.
    pub(crate) fn failing_item_insert() -> Self {
        Self {
            fail_item_insert: true,
            ..Self::default()
        }
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, MemoryTables>> {
        self.tables.lock().map_err(|_| anyhow::anyhow!("poisoned"))
    }

    pub(crate) fn seed(&self, order: OrderEntity, items: &[(Uuid, i32, i64)]) {
        if let Ok(mut tables) = self.tables() {
            for (product_id, quantity, unit_price) in items {
                tables.next_item_id += 1;
                let id = tables.next_item_id;
                tables.items.push(OrderItemEntity {
                    id,
                    order_id: order.id,
                    product_id: *product_id,
                    quantity: *quantity,
                    unit_price: *unit_price,
                    subtotal: unit_price * i64::from(*quantity),
                    created_at: order.created_at,
                });
            }
            tables.orders.push(order);
        }
    }

    pub(crate) fn orders(&self) -> Vec<OrderEntity> {
        self.tables().map(|t| t.orders.clone()).unwrap_or_default()
    }

    pub(crate) fn items_of(&self, order_id: Uuid) -> Vec<OrderItemEntity> {
        self.tables()
            .map(|t| {
                t.items
                    .iter()
                    .filter(|item| item.order_id == order_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn status_writes(&self, order_id: Uuid) -> Vec<OrderStatus> {
        self.tables()
            .map(|t| {
                t.status_writes
                    .iter()
                    .filter(|(id, _)| *id == order_id)
                    .map(|(_, status)| *status)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn create_attempts(&self) -> usize {
        self.tables().map(|t| t.create_attempts).unwrap_or_default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_order(
        &self,
        order: CreateOrderEntity,
        items: Vec<NewOrderItem>,
    ) -> Result<(OrderEntity, Vec<OrderItemEntity>)> {
        let mut tables = self.tables()?;
        tables.create_attempts += 1;

        let now = Utc::now();
        let created = OrderEntity {
            id: Uuid::new_v4(),
            order_number: order.order_number,
            user_id: order.user_id,
            status: order.status,
            subtotal: order.subtotal,
            shipping_fee: order.shipping_fee,
            discount: order.discount,
            total_amount: order.total_amount,
            shipping_name: order.shipping_name,
            shipping_phone: order.shipping_phone,
            shipping_address: order.shipping_address,
            shipping_city: order.shipping_city,
            shipping_postal_code: order.shipping_postal_code,
            payment_method: order.payment_method,
            estimated_delivery: order.estimated_delivery,
            created_at: now,
            updated_at: now,
        };
        tables.orders.push(created.clone());

        if self.fail_item_insert {
            // Roll the header back, as the database transaction would.
            tables.orders.retain(|o| o.id != created.id);
            return Err(anyhow::anyhow!("Failed to create order items"));
        }

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            tables.next_item_id += 1;
            rows.push(OrderItemEntity {
                id: tables.next_item_id,
                order_id: created.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
                created_at: now,
            });
        }
        tables.items.extend(rows.iter().cloned());

        Ok((created, rows))
    }

    async fn find_order(&self, id: Uuid, owner: Option<Uuid>) -> Result<Option<OrderEntity>> {
        Ok(self
            .tables()?
            .orders
            .iter()
            .find(|o| o.id == id && owner.is_none_or(|owner| o.user_id == owner))
            .cloned())
    }

    async fn find_order_by_number(&self, order_number: String) -> Result<Option<OrderEntity>> {
        Ok(self
            .tables()?
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_orders(
        &self,
        owner: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<OrderEntity>> {
        let mut orders: Vec<OrderEntity> = self
            .tables()?
            .orders
            .iter()
            .filter(|o| owner.is_none_or(|owner| o.user_id == owner))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            orders.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(orders)
    }

    async fn list_orders_since(&self, since: DateTime<Utc>) -> Result<Vec<OrderEntity>> {
        Ok(self
            .tables()?
            .orders
            .iter()
            .filter(|o| o.created_at >= since)
            .cloned()
            .collect())
    }

    async fn list_order_items(&self, order_ids: Vec<Uuid>) -> Result<Vec<OrderItemEntity>> {
        Ok(self
            .tables()?
            .items
            .iter()
            .filter(|item| order_ids.contains(&item.order_id))
            .cloned()
            .collect())
    }

    async fn update_order(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        update: OrderUpdate,
    ) -> Result<Option<OrderEntity>> {
        let mut tables = self.tables()?;
        let Some(order) = tables.orders.iter_mut().find(|o| {
            o.id == id
                && owner.is_none_or(|owner| o.user_id == owner)
                && update.allowed_from.contains(&o.status)
        }) else {
            return Ok(None);
        };

        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(payment_method) = update.payment_method {
            order.payment_method = payment_method;
        }
        order.updated_at = Utc::now();
        let updated = order.clone();

        if let Some(status) = update.status {
            tables.status_writes.push((id, status));
        }

        Ok(Some(updated))
    }
}

/// Builds an [`AppState`] out of fakes, overridable piece by piece.
pub(crate) struct TestState {
    identity: Option<Arc<dyn IdentityProvider>>,
    users: HashMap<String, Uuid>,
    profiles: Option<Arc<dyn ProfileStore>>,
    fake_profiles: FakeProfiles,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogStore>,
    checkout: CheckoutConfig,
}

impl TestState {
    pub(crate) fn new() -> Self {
        Self {
            identity: None,
            users: HashMap::new(),
            profiles: None,
            fake_profiles: FakeProfiles::default(),
            orders: Arc::new(MemoryOrderStore::default()),
            catalog: Arc::new(MockCatalogStore::new()),
            checkout: CheckoutConfig::default(),
        }
    }

    pub(crate) fn identity<I: IdentityProvider + 'static>(mut self, identity: I) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    pub(crate) fn identity_arc(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub(crate) fn profiles<P: ProfileStore + 'static>(mut self, profiles: P) -> Self {
        self.profiles = Some(Arc::new(profiles));
        self
    }

    /// A token the identity provider accepts, with no profile row.
    pub(crate) fn user(mut self, token: &str, user_id: Uuid) -> Self {
        self.users.insert(token.to_string(), user_id);
        self
    }

    pub(crate) fn with_role(self, token: &str, user_id: Uuid, role: Role) -> Self {
        self.fake_profiles.insert(profile(user_id, role));
        self.user(token, user_id)
    }

    pub(crate) fn customer(self, token: &str, user_id: Uuid) -> Self {
        self.with_role(token, user_id, Role::Customer)
    }

    pub(crate) fn producer(self, token: &str, user_id: Uuid) -> Self {
        self.with_role(token, user_id, Role::Producer)
    }

    pub(crate) fn admin(self, token: &str, user_id: Uuid) -> Self {
        self.with_role(token, user_id, Role::Admin)
    }

    pub(crate) fn orders<S: OrderStore + 'static>(mut self, orders: Arc<S>) -> Self {
        self.orders = orders;
        self
    }

    pub(crate) fn catalog<C: CatalogStore + 'static>(mut self, catalog: C) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub(crate) fn policy(mut self, policy: TransitionPolicy) -> Self {
        self.checkout.transition_policy = policy;
        self
    }

    pub(crate) fn build(self) -> AppState {
        let identity = self.identity.unwrap_or_else(|| {
            Arc::new(FakeIdentity {
                users: self.users,
                signed_out: Mutex::new(Vec::new()),
            })
        });
        let profiles = self
            .profiles
            .unwrap_or_else(|| Arc::new(self.fake_profiles));

        AppState {
            orders: self.orders,
            catalog: self.catalog,
            profiles,
            identity,
            storage: ObjectStorage::new(&StorageConfig {
                url: "https://storage.test".into(),
                bucket: "products".into(),
            }),
            profile_cache: Arc::new(ProfileCache::new(&ProfileCacheConfig {
                capacity: 64,
                ttl: Duration::from_secs(60),
            })),
            checkout: self.checkout,
        }
    }
}

/// [`FakeIdentity`] preloaded with tokens, for tests that need to observe
/// sign-outs after the state was built.
pub(crate) fn shared_identity(users: &[(&str, Uuid)]) -> Arc<FakeIdentity> {
    Arc::new(FakeIdentity {
        users: users
            .iter()
            .map(|(token, id)| ((*token).to_string(), *id))
            .collect(),
        signed_out: Mutex::new(Vec::new()),
    })
}
