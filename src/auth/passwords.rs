use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;
use tokio::sync::Semaphore;

use crate::auth::config::PasswordHashParams;
use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;

#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new(params: PasswordHashParams) -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(params.m_cost_kib);
        builder.t_cost(params.t_cost);
        builder.p_cost(params.p_cost);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }
}

/// Runs Argon2 work on Tokio's blocking threads, at most `workers` at a time.
///
/// Each job owns its semaphore permit, so a caller that stops awaiting
/// leaves the job to finish and release the slot on its own.
#[derive(Clone)]
pub struct HashingPool {
    service: PasswordService,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl HashingPool {
    pub fn new(service: PasswordService, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            service,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Stop accepting jobs; pending and later calls fail with `HashingPool`.
    #[cfg(test)]
    pub(crate) fn close(&self) {
        self.permits.close();
    }

    pub async fn hash(&self, password: String) -> AuthResult<String> {
        self.run(move |service| service.hash_password(&password))
            .await
    }

    pub async fn verify(&self, password: String, encoded: String) -> AuthResult<bool> {
        self.run(move |service| service.verify_password(&password, &encoded))
            .await
    }

    async fn run<T, F>(&self, job: F) -> AuthResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&PasswordService) -> AuthResult<T> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| AuthError::HashingPool(err.to_string()))?;
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(&service)
        })
        .await?
    }
}
