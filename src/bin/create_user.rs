use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use todo_api::auth::{AuthConfig, AuthError, AuthState, PgCredentialStore};

#[derive(Parser, Debug)]
#[command(
    name = "create_user",
    about = "Create a Todo API account using the server's auth settings"
)]
struct Args {
    /// Username for the account (case insensitive).
    #[arg(long)]
    username: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Database to write to; defaults to `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
    };

    let database_url = match args.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL")?,
    };
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    todo_api::db::run_migrations(&pool).await?;

    let state = AuthState::from_config(config, Arc::new(PgCredentialStore::new(pool)))?;

    match state
        .credentials
        .register(&args.username, &args.password)
        .await
    {
        Ok(identity) => {
            println!(
                "Created user '{}' with id {}",
                identity.username, identity.id
            );
            Ok(())
        }
        Err(AuthError::DuplicateIdentity) => {
            writeln!(
                io::stderr(),
                "error: a user named '{}' already exists.",
                args.username.trim().to_lowercase()
            )?;
            std::process::exit(1);
        }
        Err(err) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
    }
}
