#[macro_use]
extern crate rocket;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;

use crate::auth::{AuthConfig, AuthResult, AuthState, PgCredentialStore};
use crate::config::ServerConfig;
use crate::db::TodoDb;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Every API route, with the generated `/openapi.json` document.
pub fn api_routes() -> Vec<Route> {
    openapi_get_routes![
        // Health routes
        routes::health::index,
        routes::health::health_check,
        // Auth routes
        auth::routes::register,
        auth::routes::login,
        auth::routes::protected_test,
        // Todo routes
        routes::todos::create_todo,
        routes::todos::list_todos,
        routes::todos::get_todo,
        routes::todos::update_todo,
        routes::todos::delete_todo,
    ]
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    // `.env` is loaded by `ServerConfig::from_env`, so it must run first.
    let server_config = ServerConfig::from_env();
    let auth_config = AuthConfig::from_env();
    build_rocket(server_config, auth_config)
}

/// Assemble the application from already-loaded settings. An auth config
/// error fails the "Auth Config" fairing, so ignition aborts.
pub fn build_rocket(
    server_config: ServerConfig,
    auth_config: AuthResult<AuthConfig>,
) -> Rocket<Build> {
    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::custom(server_config.figment())
        .attach(RequestLogger)
        // Load the signing secret once; a missing secret aborts launch
        .attach(AdHoc::try_on_ignite("Auth Config", move |rocket| async move {
            match auth_config {
                Ok(config) => Ok(rocket.manage(config)),
                Err(e) => {
                    log::error!("refusing to start: {}", e);
                    Err(rocket)
                }
            }
        }))
        .attach(TodoDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match TodoDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match db::run_migrations(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite("Auth State", |rocket| async move {
            let Some(config) = rocket.state::<AuthConfig>().cloned() else {
                log::error!("auth config not loaded; skipping auth state");
                return Err(rocket);
            };

            let pool = match TodoDb::fetch(&rocket) {
                Some(db) => (**db).clone(),
                None => {
                    log::error!("database pool not available for credential store");
                    return Err(rocket);
                }
            };

            match AuthState::from_config(config, Arc::new(PgCredentialStore::new(pool))) {
                Ok(state) => {
                    log::info!(
                        "auth ready: token ttl {}s, {} password hashing workers",
                        state.config.access_token_ttl_secs,
                        state.config.hash_workers
                    );
                    Ok(rocket.manage(state))
                }
                Err(e) => {
                    log::error!("failed to initialise auth: {}", e);
                    Err(rocket)
                }
            }
        }))
        .register("/", routes::catchers::all())
        .mount("/", api_routes())
        .mount(
            "/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Todo API", "../../openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::sync::Arc;

    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::Database;
    use rocket_db_pools::sqlx::{self, PgPool};

    use crate::auth::config::PasswordHashParams;
    use crate::auth::{AuthConfig, AuthState, CredentialStore, MemoryCredentialStore};
    use crate::db::TodoDb;
    use crate::request_logger::RequestLogger;
    use crate::routes::catchers;

    pub use database::{TestDatabase, TestDatabaseError};

    pub const TEST_JWT_SECRET: &str = "test-signing-secret";

    /// Auth settings with cheap Argon2 parameters so tests stay fast.
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            issuer: "https://todo.test".into(),
            audience: "todo-api".into(),
            access_token_ttl_secs: 900,
            password_min_length: 1,
            password_hash: PasswordHashParams {
                m_cost_kib: 256,
                t_cost: 1,
                p_cost: 1,
            },
            hash_workers: 2,
            jwt_secret: TEST_JWT_SECRET.into(),
        }
    }

    /// Auth state backed by the given store.
    pub fn test_auth_state(store: Arc<dyn CredentialStore>) -> AuthState {
        AuthState::from_config(test_auth_config(), store).expect("test auth state")
    }

    /// Auth state backed by a fresh in-memory credential store.
    pub fn memory_auth_state() -> AuthState {
        test_auth_state(Arc::new(MemoryCredentialStore::new()))
    }

    /// Convenience helpers for seeding tables in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        /// Create a fixture helper bound to the provided pool.
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a user row directly, returning the new user id.
        pub async fn insert_user(
            &self,
            username: &str,
            password_hash: &str,
        ) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
            )
            .bind(username)
            .bind(password_hash)
            .fetch_one(self.pool)
            .await
        }

        /// Insert a todo owned by `user_id`, returning its id.
        pub async fn insert_todo(&self, user_id: i32, title: &str) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar("INSERT INTO todos (user_id, title) VALUES ($1, $2) RETURNING id")
                .bind(user_id)
                .bind(title)
                .fetch_one(self.pool)
                .await
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("TEST_DATABASE_URL not set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            database_url: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Provision a fresh database on the server named by
            /// `TEST_DATABASE_URL`, or in a disposable container when
            /// `TODO_TEST_CONTAINERS=1`.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::provision(&url, None).await;
                }
                let use_containers = std::env::var("TODO_TEST_CONTAINERS")
                    .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false);
                if use_containers {
                    return Self::new().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            /// Provision a fresh database by launching a disposable Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag("16-alpine").start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::provision(&admin_url, Some(container)).await
            }

            async fn provision(
                admin_url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone();
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                crate::db::run_migrations(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_url: replace_database(admin_url, &new_db_name),
                    database_name: new_db_name,
                    container,
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled connection handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Connection URL of the ephemeral database, for Rocket's pool config.
            pub fn url(&self) -> &str {
                &self.database_url
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        fn replace_database(url: &str, database: &str) -> String {
            let (base, query) = match url.split_once('?') {
                Some((base, query)) => (base, Some(query)),
                None => (url, None),
            };
            let prefix = match base.rfind('/') {
                Some(idx) if idx > "postgres://".len() => &base[..idx],
                _ => base,
            };
            match query {
                Some(query) => format!("{prefix}/{database}?{query}"),
                None => format!("{prefix}/{database}"),
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ =
                                drop_database_with_fallback(admin_options.clone(), &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(
                                        admin_options.clone(),
                                        &db_name,
                                    )
                                    .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }

        #[cfg(test)]
        mod tests {
            use super::replace_database;

            #[test]
            fn swaps_database_name_in_url() {
                assert_eq!(
                    replace_database("postgres://u:p@localhost:5432/postgres", "fresh"),
                    "postgres://u:p@localhost:5432/fresh"
                );
                assert_eq!(
                    replace_database("postgres://u:p@localhost:5432/app?sslmode=disable", "fresh"),
                    "postgres://u:p@localhost:5432/fresh?sslmode=disable"
                );
                assert_eq!(
                    replace_database("postgres://u:p@localhost:5432", "fresh"),
                    "postgres://u:p@localhost:5432/fresh"
                );
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        auth_state: Option<AuthState>,
        with_database: bool,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                auth_state: None,
                with_database: false,
            }
        }

        /// Mount routes at the server root, as production does.
        pub fn mount_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/".to_string(), routes));
            self
        }

        /// Manage the auth state consulted by auth routes and the access gate.
        pub fn manage_auth_state(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        /// Attach the `TodoDb` pool pointed at `url`, for routes taking
        /// `Connection<TodoDb>`.
        pub fn with_database_url(mut self, url: &str) -> Self {
            self.figment = self
                .figment
                .merge(("databases.todo_db.url", url.to_string()))
                .merge(("databases.todo_db.max_connections", 5));
            self.with_database = true;
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment)
                .attach(RequestLogger)
                .register("/", catchers::all());

            if self.with_database {
                rocket = rocket.attach(TodoDb::init());
            }

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
