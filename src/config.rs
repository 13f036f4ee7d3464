//! Environment-driven configuration, read once at boot.

use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, Result};

use crate::status::TransitionPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub storage: StorageConfig,
    pub checkout: CheckoutConfig,
    pub profile_cache: ProfileCacheConfig,
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutConfig {
    /// Flat fee added to every order, in the same minor units as prices.
    pub shipping_fee: i64,
    pub estimated_delivery_days: i64,
    pub transition_policy: TransitionPolicy,
}

impl CheckoutConfig {
    /// Longest delivery estimate accepted from the environment.
    pub const MAX_DELIVERY_DAYS: i64 = 365;

    pub fn validate(&self) -> Result<()> {
        if self.shipping_fee < 0 {
            anyhow::bail!("SHIPPING_FEE must not be negative");
        }
        if !(0..=Self::MAX_DELIVERY_DAYS).contains(&self.estimated_delivery_days) {
            anyhow::bail!(
                "ESTIMATED_DELIVERY_DAYS must be between 0 and {}",
                Self::MAX_DELIVERY_DAYS
            );
        }
        Ok(())
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            shipping_fee: 12_000,
            estimated_delivery_days: 5,
            transition_policy: TransitionPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileCacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

pub fn load() -> Result<Config> {
    let checkout = CheckoutConfig {
        shipping_fee: var_or("SHIPPING_FEE", 12_000)?,
        estimated_delivery_days: var_or("ESTIMATED_DELIVERY_DAYS", 5)?,
        transition_policy: var_or("ORDER_TRANSITION_POLICY", TransitionPolicy::Strict)?,
    };
    checkout.validate()?;

    Ok(Config {
        server: ServerConfig {
            addr: var_or("SERVER_ADDR", "0.0.0.0:3000".to_string())?,
        },
        database: DatabaseConfig {
            url: required("DATABASE_URL")?,
        },
        identity: IdentityConfig {
            url: required("AUTH_URL")?,
            api_key: required("AUTH_API_KEY")?,
        },
        storage: StorageConfig {
            url: required("STORAGE_URL")?,
            bucket: var_or("STORAGE_BUCKET", "products".to_string())?,
        },
        checkout,
        profile_cache: ProfileCacheConfig {
            capacity: var_or("PROFILE_CACHE_CAPACITY", 1024)?,
            ttl: Duration::from_secs(var_or("PROFILE_CACHE_TTL_SECS", 300)?),
        },
        http_timeout: Duration::from_secs(var_or("HTTP_TIMEOUT_SECS", 10)?),
    })
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|err| anyhow::anyhow!("{key} has an invalid value `{raw}`: {err}")),
        Err(_) => Ok(default),
    }
}
