use crate::auth::{AuthError, AuthResult};

/// Longest access token lifetime accepted from configuration (one year).
pub const MAX_ACCESS_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Argon2id cost parameters used for password hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHashParams {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for PasswordHashParams {
    fn default() -> Self {
        Self {
            m_cost_kib: 19 * 1024, // 19 MiB
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// Authentication configuration loaded from environment variables.
#[derive(Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
    pub password_min_length: usize,
    pub password_hash: PasswordHashParams,
    pub hash_workers: usize,
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("password_min_length", &self.password_min_length)
            .field("password_hash", &self.password_hash)
            .field("hash_workers", &self.hash_workers)
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Fails with [`AuthError::SigningUnavailable`] when `JWT_SECRET` is
    /// missing or blank; every other setting has a default.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            return Err(AuthError::SigningUnavailable(
                "JWT_SECRET is required and must not be empty".into(),
            ));
        }

        let issuer = lookup("JWT_ISSUER").unwrap_or_else(|| "todo-api".into());
        let audience = lookup("JWT_AUDIENCE").unwrap_or_else(|| "todo-api-clients".into());
        let access_token_ttl_secs = match parsed("ACCESS_TOKEN_TTL_SECS").filter(|ttl| *ttl > 0) {
            Some(ttl) if ttl > MAX_ACCESS_TOKEN_TTL_SECS => {
                return Err(AuthError::InvalidConfig(format!(
                    "ACCESS_TOKEN_TTL_SECS must be at most {MAX_ACCESS_TOKEN_TTL_SECS}, got {ttl}"
                )));
            }
            Some(ttl) => ttl as i64,
            None => 24 * 60 * 60,
        };
        let password_min_length = parsed("PASSWORD_MIN_LENGTH")
            .map(|len| (len as usize).max(1))
            .unwrap_or(1);

        let defaults = PasswordHashParams::default();
        let cost = |key: &str, default: u32| -> AuthResult<u32> {
            match parsed(key) {
                Some(value) => u32::try_from(value).map_err(|_| {
                    AuthError::InvalidConfig(format!("{key} is out of range: {value}"))
                }),
                None => Ok(default),
            }
        };
        let password_hash = PasswordHashParams {
            m_cost_kib: cost("ARGON2_M_COST_KIB", defaults.m_cost_kib)?,
            t_cost: cost("ARGON2_T_COST", defaults.t_cost)?,
            p_cost: cost("ARGON2_P_COST", defaults.p_cost)?,
        };
        let hash_workers = parsed("PASSWORD_HASH_WORKERS")
            .map(|v| v as usize)
            .filter(|v| *v > 0)
            .unwrap_or_else(num_cpus::get);

        Ok(Self {
            issuer,
            audience,
            access_token_ttl_secs,
            password_min_length,
            password_hash,
            hash_workers,
            jwt_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = AuthConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, AuthError::SigningUnavailable(_)));

        let err = AuthConfig::from_lookup(lookup_from(&[("JWT_SECRET", "   ")])).unwrap_err();
        assert!(matches!(err, AuthError::SigningUnavailable(_)));
    }

    #[test]
    fn applies_defaults() {
        let config = AuthConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")]))
            .expect("config loads");
        assert_eq!(config.access_token_ttl_secs, 86_400);
        assert_eq!(config.password_min_length, 1);
        assert_eq!(config.password_hash, PasswordHashParams::default());
        assert!(config.hash_workers >= 1);
        assert_eq!(config.issuer, "todo-api");
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_TTL_SECS", "60"),
            ("PASSWORD_MIN_LENGTH", "8"),
            ("ARGON2_T_COST", "not-a-number"),
            ("PASSWORD_HASH_WORKERS", "0"),
        ]))
        .expect("config loads");
        assert_eq!(config.access_token_ttl_secs, 60);
        assert_eq!(config.password_min_length, 8);
        assert_eq!(config.password_hash.t_cost, 2);
        assert!(config.hash_workers >= 1);
    }

    #[test]
    fn rejects_out_of_range_token_lifetimes() {
        for ttl in ["31536001", "9000000000000", "18446744073709551615"] {
            let err = AuthConfig::from_lookup(lookup_from(&[
                ("JWT_SECRET", "s3cret"),
                ("ACCESS_TOKEN_TTL_SECS", ttl),
            ]))
            .unwrap_err();
            assert!(matches!(err, AuthError::InvalidConfig(_)), "ttl {ttl}");
        }

        let config = AuthConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_TTL_SECS", "31536000"),
        ]))
        .expect("one year is accepted");
        assert_eq!(config.access_token_ttl_secs, 31_536_000);
    }

    #[test]
    fn rejects_argon2_costs_that_do_not_fit_u32() {
        let err = AuthConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("ARGON2_T_COST", "4294967297"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig(_)));

        let config = AuthConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("ARGON2_M_COST_KIB", "4294967295"),
        ]))
        .expect("u32::MAX fits");
        assert_eq!(config.password_hash.m_cost_kib, u32::MAX);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = AuthConfig::from_lookup(lookup_from(&[("JWT_SECRET", "hunter2")]))
            .expect("config loads");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
