use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::{app_error::AppError, config::IdentityConfig};

/// The hosted identity provider. The service never sees passwords; it only
/// turns a caller's bearer token into a user id and revokes sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user behind `token`. `Ok(None)` means the provider rejected
    /// the token.
    async fn current_user(&self, token: &str) -> Result<Option<Uuid>>;

    async fn sign_out(&self, token: &str) -> Result<()>;
}

#[derive(Deserialize)]
struct IdentityUser {
    id: Uuid,
}

#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(client: Client, config: &IdentityConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current_user(&self, token: &str) -> Result<Option<Uuid>> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("IdentityProvider".into()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user: IdentityUser = response
                    .json()
                    .await
                    .context("Failed to parse identity provider user")?;
                Ok(Some(user.id))
            }
            status => Err(anyhow::anyhow!(
                "Identity provider answered {} while resolving caller",
                status
            )),
        }
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("IdentityProvider".into()))?;

        // An already expired session is as signed out as it gets.
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        Err(anyhow::anyhow!(
            "Identity provider answered {} while signing out",
            response.status()
        ))
    }
}
