use std::sync::Arc;

use crate::auth::passwords::{HashingPool, PasswordService};
use crate::auth::store::{CredentialStore, Identity};
use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Registers identities and checks login attempts.
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    hasher: HashingPool,
    password_min_length: usize,
    // Compared against when the handle is unknown so both failure paths do
    // the same Argon2 work.
    dummy_hash: String,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        password_service: PasswordService,
        config: &AuthConfig,
    ) -> AuthResult<Self> {
        let dummy_hash = password_service.hash_password(&uuid::Uuid::new_v4().to_string())?;
        Ok(Self {
            store,
            hasher: HashingPool::new(password_service, config.hash_workers),
            password_min_length: config.password_min_length.max(1),
            dummy_hash,
        })
    }

    pub async fn register(&self, username: &str, password: &str) -> AuthResult<Identity> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username is required".into()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password is required".into()));
        }
        if password.chars().count() < self.password_min_length {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                self.password_min_length
            )));
        }

        let hash = self.hasher.hash(password.to_string()).await?;
        let identity = self.store.insert(&username, &hash).await?;
        log::info!("registered user {} ({})", identity.id, identity.username);
        Ok(identity)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<Identity> {
        let username = normalize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let Some(stored) = self.store.find_by_username(&username).await? else {
            self.hasher
                .verify(password.to_string(), self.dummy_hash.clone())
                .await?;
            log::debug!("login rejected: unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let verified = self
            .hasher
            .verify(password.to_string(), stored.password_hash().to_string())
            .await?;
        if !verified {
            log::debug!("login rejected: password mismatch for user {}", stored.identity.id);
            return Err(AuthError::InvalidCredentials);
        }

        Ok(stored.identity)
    }
}

/// Handles are compared case-insensitively and without surrounding space.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
