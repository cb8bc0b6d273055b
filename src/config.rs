use std::env;

use rocket::figment::Figment;

/// Process-level settings read from the environment (and `.env`).
///
/// Values here override `Rocket.toml`; anything unset falls back to
/// Rocket's own configuration sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: Option<String>,
    pub port: Option<u16>,
    pub address: Option<String>,
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => log::info!("loaded environment from {}", path.display()),
            Err(err) if err.not_found() => {
                log::warn!(".env file not found, using environment variables")
            }
            Err(err) => log::warn!("failed to read .env file: {}", err),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let port = non_empty("PORT").and_then(|value| match value.trim().parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                log::warn!("ignoring invalid PORT value '{}'", value);
                None
            }
        });

        Self {
            database_url: non_empty("DATABASE_URL"),
            port,
            address: non_empty("ADDRESS"),
        }
    }

    /// Layer these settings on top of Rocket's default figment.
    pub fn figment(&self) -> Figment {
        let mut figment = rocket::Config::figment();
        if let Some(url) = &self.database_url {
            figment = figment.merge(("databases.todo_db.url", url.clone()));
        }
        if let Some(port) = self.port {
            figment = figment.merge(("port", port));
        }
        if let Some(address) = &self.address {
            figment = figment.merge(("address", address.clone()));
        }
        figment
    }
}
