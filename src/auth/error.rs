use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::Request;
use rocket_db_pools::sqlx;
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use thiserror::Error;

use crate::error::{error_responses, json_error};

pub type AuthResult<T> = Result<T, AuthError>;

/// Message returned to clients for every token-related rejection.
pub const UNAUTHORIZED_MESSAGE: &str = "authentication required";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("identity already exists")]
    DuplicateIdentity,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("bearer token missing")]
    MissingToken,
    #[error("token malformed")]
    MalformedToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("unauthorized")]
    Unauthorized,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
    #[error("signing unavailable: {0}")]
    SigningUnavailable(String),
    #[error("invalid auth configuration: {0}")]
    InvalidConfig(String),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("password hashing worker failed: {0}")]
    HashingPool(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidInput(_) => Status::BadRequest,
            AuthError::DuplicateIdentity => Status::Conflict,
            AuthError::InvalidCredentials => Status::Unauthorized,
            AuthError::MissingToken
            | AuthError::MalformedToken
            | AuthError::ExpiredToken
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::StorageUnavailable(_) => Status::ServiceUnavailable,
            AuthError::SigningUnavailable(_)
            | AuthError::InvalidConfig(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::HashingPool(_) => Status::InternalServerError,
        }
    }

    /// Stable machine-readable kind used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(_) => "InvalidInput",
            AuthError::DuplicateIdentity => "DuplicateIdentity",
            AuthError::InvalidCredentials => "InvalidCredentials",
            AuthError::MissingToken
            | AuthError::MalformedToken
            | AuthError::ExpiredToken
            | AuthError::Unauthorized => "Unauthorized",
            AuthError::StorageUnavailable(_) => "StorageUnavailable",
            AuthError::SigningUnavailable(_)
            | AuthError::InvalidConfig(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::HashingPool(_) => "InternalError",
        }
    }

    /// Text safe to show a client. Token failures collapse to one message
    /// and internal failures never echo their cause.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::MissingToken
            | AuthError::MalformedToken
            | AuthError::ExpiredToken
            | AuthError::Unauthorized => UNAUTHORIZED_MESSAGE.to_string(),
            AuthError::StorageUnavailable(_) => "storage temporarily unavailable".to_string(),
            AuthError::SigningUnavailable(_)
            | AuthError::InvalidConfig(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::HashingPool(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for AuthError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            log::error!("auth failure: {}", self);
        } else {
            log::debug!("auth rejection: {}", self);
        }
        json_error(status, self.kind(), self.public_message())
    }
}

impl OpenApiResponderInner for AuthError {
    fn responses(_generator: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        Ok(error_responses(&[
            ("400", "Username or password missing or rejected by policy."),
            ("401", "Invalid credentials or bearer token."),
            ("409", "Username already registered."),
            ("500", "Unexpected server error."),
            ("503", "Credential storage is temporarily unavailable."),
        ]))
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::HashingPool(err.to_string())
    }
}
