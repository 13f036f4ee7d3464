//! Bounded, expiring cache of caller roles.
//!
//! Every authenticated request needs the caller's role. Entries expire after
//! the configured TTL and are dropped explicitly on sign-out and profile edits.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use uuid::Uuid;

use crate::{config::ProfileCacheConfig, role::Role};

#[derive(Debug, Clone, Copy)]
struct CachedProfile {
    role: Role,
    cached_at: Instant,
}

#[derive(Debug)]
pub struct ProfileCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<Uuid, CachedProfile>>,
}

impl ProfileCache {
    pub fn new(config: &ProfileCacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            capacity: config.capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: Uuid) -> Option<Role> {
        let mut entries = self.lock();
        match entries.get(&user_id) {
            Some(entry) if entry.cached_at.elapsed() <= self.ttl => Some(entry.role),
            Some(_) => {
                entries.remove(&user_id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, user_id: Uuid, role: Role) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.lock();
        entries.retain(|_, entry| entry.cached_at.elapsed() <= self.ttl);
        if entries.len() >= self.capacity && !entries.contains_key(&user_id) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.cached_at)
                .map(|(id, _)| *id)
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            user_id,
            CachedProfile {
                role,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, user_id: Uuid) {
        self.lock().remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, CachedProfile>> {
        // A poisoned map only ever holds stale roles; keep serving it.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl: Duration) -> ProfileCache {
        ProfileCache::new(&ProfileCacheConfig { capacity, ttl })
    }

    #[test]
    fn returns_cached_role_until_invalidated() {
        let cache = cache(4, Duration::from_secs(60));
        let user = Uuid::new_v4();

        cache.insert(user, Role::Admin);
        assert_eq!(cache.get(user), Some(Role::Admin));

        cache.invalidate(user);
        assert_eq!(cache.get(user), None);
    }

    #[test]
    fn expired_entries_are_not_served() {
        let cache = cache(4, Duration::ZERO);
        let user = Uuid::new_v4();

        cache.insert(user, Role::Producer);
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(cache.get(user), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_the_oldest_entry_at_capacity() {
        let cache = cache(2, Duration::from_secs(60));
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        cache.insert(first, Role::Customer);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(second, Role::Customer);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(third, Role::Admin);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(first), None);
        assert_eq!(cache.get(third), Some(Role::Admin));
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = cache(0, Duration::from_secs(60));
        let user = Uuid::new_v4();

        cache.insert(user, Role::Admin);

        assert_eq!(cache.get(user), None);
    }
}
