//! HTTP route handlers grouped by resource domain.
//!
//! Auth routes live in [`crate::auth::routes`]; this module holds the
//! resources behind the access gate plus service status endpoints. Handlers
//! are annotated with `#[openapi]` so `rocket_okapi` can derive an OpenAPI
//! document automatically.

pub mod catchers;
pub mod health;
pub mod todos;
