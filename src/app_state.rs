use std::sync::Arc;

use crate::{
    api::{identity::IdentityProvider, storage::ObjectStorage},
    config::CheckoutConfig,
    profile_cache::ProfileCache,
    store::{CatalogStore, OrderStore, ProfileStore},
};

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: ObjectStorage,
    pub profile_cache: Arc<ProfileCache>,
    pub checkout: CheckoutConfig,
}
