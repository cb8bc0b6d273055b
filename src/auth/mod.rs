//! Authentication module: configuration, credential handling, token minting,
//! the Rocket access gate, and HTTP route handlers.

use std::sync::Arc;

pub mod config;
pub mod credentials;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod passwords;
pub mod responses;
pub mod routes;
pub mod store;

pub use config::AuthConfig;
pub use credentials::CredentialService;
pub use error::{AuthError, AuthResult};
pub use guards::AuthUser;
pub use jwt::JwtService;
pub use passwords::PasswordService;
pub use store::{CredentialStore, Identity, MemoryCredentialStore, PgCredentialStore};

/// Everything the auth routes and the gate need, managed as Rocket state.
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub credentials: Arc<CredentialService>,
    pub jwt_service: Arc<JwtService>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        credentials: CredentialService,
        jwt_service: JwtService,
    ) -> Self {
        Self {
            config,
            credentials: Arc::new(credentials),
            jwt_service: Arc::new(jwt_service),
        }
    }

    /// Wire the services from configuration around the given store.
    pub fn from_config(config: AuthConfig, store: Arc<dyn CredentialStore>) -> AuthResult<Self> {
        let password_service = PasswordService::new(config.password_hash)?;
        let credentials = CredentialService::new(store, password_service, &config)?;
        let jwt_service = JwtService::from_config(&config)?;
        Ok(Self::new(config, credentials, jwt_service))
    }
}
